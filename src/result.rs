//! Materialized query results.
//!
//! The driver's streaming result set borrows the connection, so `query`
//! drains it eagerly into a [`DbResult`]: ordered column names, rows of
//! text-protocol values and the affected-row count captured when the
//! statement ran. Sequential access (`fetch_assoc`) and random access
//! (`fetch_result`) both work on the materialized data without touching
//! the connection again.

use std::sync::Arc;

use indexmap::IndexMap;
use mysql::Value;

use crate::error::{DbError, Result};

/// One row of a result set. Values are the text forms the MySQL text
/// protocol delivers; `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRow {
    columns: Arc<Vec<String>>,
    values: Vec<Option<String>>,
}

impl DbRow {
    /// Column names, in select order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Cell values, in select order
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Look up a cell by column name. The outer `Option` is "no such
    /// column", the inner one is SQL NULL.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        let index = self.columns.iter().position(|c| c == column)?;
        Some(self.values[index].as_deref())
    }

    /// The row as an ordered column-name → value mapping
    pub fn assoc(&self) -> IndexMap<String, Option<String>> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

/// A fully materialized result set
#[derive(Debug, Clone, PartialEq)]
pub struct DbResult {
    columns: Arc<Vec<String>>,
    rows: Vec<DbRow>,
    affected: u64,
    cursor: usize,
}

impl DbResult {
    /// Build a result from driver rows and the affected-row count the
    /// connection reported for the statement.
    pub(crate) fn materialize(driver_rows: Vec<mysql::Row>, affected: u64) -> Self {
        let columns: Arc<Vec<String>> = Arc::new(
            driver_rows
                .first()
                .map(|row| {
                    row.columns_ref()
                        .iter()
                        .map(|column| column.name_str().into_owned())
                        .collect()
                })
                .unwrap_or_default(),
        );
        let rows = driver_rows
            .into_iter()
            .map(|row| DbRow {
                columns: Arc::clone(&columns),
                values: row.unwrap().iter().map(text_value).collect(),
            })
            .collect();
        Self {
            columns,
            rows,
            affected,
            cursor: 0,
        }
    }

    /// Column names, in select order; empty for statements without a
    /// result set (and for zero-row results, which carry no metadata).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows in the result set
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// All rows, without moving the fetch cursor
    pub fn rows(&self) -> &[DbRow] {
        &self.rows
    }

    /// Fetch the next row as an ordered column-name → value mapping, or
    /// `None` once the result is exhausted. Advances the fetch cursor.
    pub fn fetch_assoc(&mut self) -> Option<IndexMap<String, Option<String>>> {
        let row = self.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(row.assoc())
    }

    /// Reset the fetch cursor to the first row
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Fetch a single cell by row and field index. Does not move the
    /// fetch cursor; out-of-range indexes are an error.
    pub fn fetch_result(&self, row: usize, field: usize) -> Result<Option<&str>> {
        let fetched = self.rows.get(row).ok_or(DbError::RowOutOfRange {
            row,
            rows: self.rows.len(),
        })?;
        let value = fetched
            .values
            .get(field)
            .ok_or(DbError::FieldOutOfRange {
                field,
                fields: fetched.values.len(),
            })?;
        Ok(value.as_deref())
    }

    /// Rows the statement that produced this result changed, as reported
    /// by the connection when the statement ran.
    pub fn affected_rows(&self) -> u64 {
        self.affected
    }
}

/// Convert a driver value to its text-protocol form. The text protocol
/// delivers `Bytes` or `NULL`; the numeric and temporal variants only show
/// up on binary-protocol paths but are rendered the same way the server
/// would print them.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(n) => Some(n.to_string()),
        Value::UInt(n) => Some(n.to_string()),
        Value::Float(n) => Some(n.to_string()),
        Value::Double(n) => Some(n.to_string()),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut out = format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            );
            if *micros > 0 {
                out.push_str(&format!(".{micros:06}"));
            }
            Some(out)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if *negative { "-" } else { "" };
            let total_hours = u64::from(*days) * 24 + u64::from(*hours);
            let mut out = format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}");
            if *micros > 0 {
                out.push_str(&format!(".{micros:06}"));
            }
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> DbResult {
        let columns = Arc::new(vec![
            "a_integer".to_string(),
            "a_string".to_string(),
            "a_nullable".to_string(),
        ]);
        let rows = vec![
            (Some("1"), Some("one"), None),
            (Some("2"), Some("two"), Some("extra")),
            (Some("42"), Some("answer"), None),
        ]
        .into_iter()
        .map(|(a, b, c)| DbRow {
            columns: Arc::clone(&columns),
            values: vec![
                a.map(str::to_string),
                b.map(str::to_string),
                c.map(str::to_string),
            ],
        })
        .collect();
        DbResult {
            columns,
            rows,
            affected: 3,
            cursor: 0,
        }
    }

    #[test]
    fn num_rows_counts_materialized_rows() {
        assert_eq!(sample_result().num_rows(), 3);
    }

    #[test]
    fn fetch_assoc_walks_rows_in_order_then_exhausts() {
        let mut result = sample_result();

        let first = result.fetch_assoc().unwrap();
        let keys: Vec<&String> = first.keys().collect();
        assert_eq!(keys, ["a_integer", "a_string", "a_nullable"]);
        assert_eq!(first["a_integer"].as_deref(), Some("1"));
        assert_eq!(first["a_nullable"], None);

        let second = result.fetch_assoc().unwrap();
        assert_eq!(second["a_nullable"].as_deref(), Some("extra"));

        assert!(result.fetch_assoc().is_some());
        assert!(result.fetch_assoc().is_none());

        result.rewind();
        assert_eq!(result.fetch_assoc().unwrap()["a_string"].as_deref(), Some("one"));
    }

    #[test]
    fn fetch_result_is_random_access() {
        let result = sample_result();
        assert_eq!(result.fetch_result(2, 1).unwrap(), Some("answer"));
        assert_eq!(result.fetch_result(0, 2).unwrap(), None);
        // does not disturb the cursor
        let mut result = result;
        assert_eq!(result.fetch_assoc().unwrap()["a_integer"].as_deref(), Some("1"));
    }

    #[test]
    fn fetch_result_rejects_out_of_range_indexes() {
        let result = sample_result();
        match result.fetch_result(9, 0) {
            Err(DbError::RowOutOfRange { row: 9, rows: 3 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
        match result.fetch_result(0, 9) {
            Err(DbError::FieldOutOfRange { field: 9, fields: 3 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn row_lookup_by_name() {
        let result = sample_result();
        let row = &result.rows()[1];
        assert_eq!(row.get("a_string"), Some(Some("two")));
        assert_eq!(row.get("a_nullable"), Some(Some("extra")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn affected_rows_is_the_captured_count() {
        assert_eq!(sample_result().affected_rows(), 3);
    }

    #[test]
    fn text_value_renders_driver_variants() {
        assert_eq!(text_value(&Value::NULL), None);
        assert_eq!(
            text_value(&Value::Bytes(b"hello".to_vec())).as_deref(),
            Some("hello")
        );
        assert_eq!(text_value(&Value::Int(-7)).as_deref(), Some("-7"));
        assert_eq!(text_value(&Value::UInt(7)).as_deref(), Some("7"));
        assert_eq!(text_value(&Value::Double(1.5)).as_deref(), Some("1.5"));
        assert_eq!(
            text_value(&Value::Date(2024, 2, 29, 12, 30, 5, 0)).as_deref(),
            Some("2024-02-29 12:30:05")
        );
        assert_eq!(
            text_value(&Value::Date(2024, 1, 1, 0, 0, 0, 250)).as_deref(),
            Some("2024-01-01 00:00:00.000250")
        );
        assert_eq!(
            text_value(&Value::Time(true, 1, 2, 3, 4, 0)).as_deref(),
            Some("-26:03:04")
        );
    }
}
