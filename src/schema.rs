//! Schema definition helpers.
//!
//! A small typed description of tables, used by test suites to create
//! their fixture tables before loading a dataset. Only the DDL this crate
//! needs: column types, NOT NULL/UNIQUE, and a table-level primary key.

use crate::connection::DbConnection;
use crate::error::Result;

/// Schema definition: the tables a suite needs
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// Drop and recreate every table in the schema
    pub fn apply(&self, conn: &mut DbConnection) -> Result<()> {
        for table in &self.tables {
            conn.query(&table.drop_table_sql())?;
            conn.query(&table.create_table_sql())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn add_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// CREATE TABLE statement for this definition
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        format!("CREATE TABLE {} ({})", self.name, parts.join(", "))
    }

    /// DROP TABLE IF EXISTS statement for this definition
    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.sql_type());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.sql());
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Int,
    BigInt,
    VarChar(u16),
    Text,
    Double,
}

impl DataType {
    fn sql_type(&self) -> String {
        match self {
            DataType::Int => "INT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::VarChar(len) => format!("VARCHAR({len})"),
            DataType::Text => "TEXT".to_string(),
            DataType::Double => "DOUBLE".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    NotNull,
    Unique,
}

impl ColumnConstraint {
    fn sql(&self) -> &'static str {
        match self {
            ColumnConstraint::NotNull => "NOT NULL",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}
