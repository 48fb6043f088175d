//! MySQL integration and utilities.
//!
//! # Intention
//!
//! - Provide a small, unified API for MySQL usage: connect, escape, query, fetch.
//! - Encapsulate driver-specific logic, types, and error handling.
//! - Back test suites with XML fixture datasets and schema helpers.
//!
//! # Architectural Boundaries
//!
//! - Only MySQL/database code belongs here.
//! - No business logic or unrelated utilities.
//! - Synchronous, single-connection use; callers own the connection handle.

pub mod config;
pub mod connection;
pub mod error;
pub mod escape;
pub mod fixture;
pub mod result;
pub mod schema;

pub use config::DbConfig;
pub use connection::DbConnection;
pub use error::{DbError, Result};
pub use fixture::{DataSet, TableData};
pub use result::{DbResult, DbRow};
pub use schema::{ColumnConstraint, ColumnDefinition, DataType, Schema, TableDefinition};
