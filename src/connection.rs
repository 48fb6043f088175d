//! Connection wrapper.
//!
//! `DbConnection` owns one driver connection and exposes the helper
//! surface: connect, escape, query. Every query is materialized into a
//! [`DbResult`] before the call returns, so results never borrow the
//! connection.

use std::fmt;

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};
use tracing::debug;

use crate::config::DbConfig;
use crate::error::Result;
use crate::escape;
use crate::result::DbResult;

/// An open MySQL connection
pub struct DbConnection {
    conn: Conn,
    config: DbConfig,
}

impl DbConnection {
    /// Open a connection described by a [`DbConfig`]
    pub fn connect(config: &DbConfig) -> Result<Self> {
        debug!(
            host = %config.host,
            port = config.port,
            user = %config.user,
            db_name = %config.db_name,
            "connecting"
        );
        let mut builder = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()));
        if !config.db_name.is_empty() {
            builder = builder.db_name(Some(config.db_name.clone()));
        }
        let conn = Conn::new(Opts::from(builder))?;
        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    /// Open a connection from the four conventional parameters, on the
    /// default port.
    ///
    /// ```no_run
    /// use rust_mysql::DbConnection;
    ///
    /// let mut conn = DbConnection::open("localhost", "root", "", "test")?;
    /// let result = conn.query("SELECT 1")?;
    /// assert_eq!(result.num_rows(), 1);
    /// # Ok::<(), rust_mysql::DbError>(())
    /// ```
    pub fn open(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        db_name: impl Into<String>,
    ) -> Result<Self> {
        Self::connect(&DbConfig::new(host, user, password, db_name))
    }

    /// The configuration this connection was opened with
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Run one SQL statement and materialize its result set. For
    /// statements without a result set (INSERT, DELETE, DDL) the result
    /// has no rows and carries the affected-row count.
    pub fn query(&mut self, sql: &str) -> Result<DbResult> {
        debug!(sql, "executing query");
        let rows: Vec<mysql::Row> = self.conn.query(sql)?;
        let affected = self.conn.affected_rows();
        Ok(DbResult::materialize(rows, affected))
    }

    /// Escape a string for interpolation into a quoted SQL literal,
    /// optionally stripping HTML tags first. Backslash escaping, valid for
    /// every server charset this crate connects with.
    pub fn escape_string(&self, input: &str, strip_tags: bool) -> String {
        escape::escape_with_options(input, strip_tags)
    }

    /// Rows changed by the last statement, as reported by the driver
    pub fn affected_rows(&self) -> u64 {
        self.conn.affected_rows()
    }
}

impl fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
