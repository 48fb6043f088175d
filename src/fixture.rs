//! XML fixture datasets.
//!
//! Test suites seed and compare database state through datasets in the
//! `mysqldump --xml` format:
//!
//! ```xml
//! <?xml version="1.0"?>
//! <mysqldump xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
//!   <database name="test">
//!     <table_data name="people">
//!       <row>
//!         <field name="id">1</field>
//!         <field name="nickname" xsi:nil="true" />
//!       </row>
//!     </table_data>
//!   </database>
//! </mysqldump>
//! ```
//!
//! [`DataSet::load`] does clean-insert: delete every row of each table in
//! the dataset, then insert the dataset's rows. [`TableData::from_query`]
//! builds a comparable table from live database state.
//!
//! The reader is a byte-cursor parser for exactly this subset of XML:
//! declarations and comments are skipped, the five predefined entities are
//! decoded, anything else is a parse error with a byte offset.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::connection::DbConnection;
use crate::error::{DbError, Result};
use crate::escape;

/// A parsed fixture: one [`TableData`] per `<table_data>` element
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    tables: Vec<TableData>,
}

impl DataSet {
    /// Parse a dataset from XML text
    pub fn parse(input: &str) -> Result<Self> {
        parse_dataset(input)
    }

    /// Read and parse a dataset file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// All tables, in document order
    pub fn tables(&self) -> &[TableData] {
        &self.tables
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Option<&TableData> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Clean-insert every table of the dataset
    pub fn load(&self, conn: &mut DbConnection) -> Result<()> {
        for table in &self.tables {
            table.clean_insert(conn)?;
        }
        Ok(())
    }

    /// Clean-insert a single table of the dataset
    pub fn load_table(&self, conn: &mut DbConnection, name: &str) -> Result<()> {
        let table = self
            .table(name)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))?;
        table.clean_insert(conn)
    }
}

/// Rows of one table: ordered columns, values in column order, `None` for
/// SQL NULL. Comparable with `==` against another `TableData`, which is
/// how suites assert whole-table state.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl TableData {
    /// Build a table directly; rows must be in column order
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Build a table from live database state. Pass a SELECT with an
    /// explicit ORDER BY when the result will be compared against a
    /// dataset; bare row order is not a server guarantee.
    pub fn from_query(conn: &mut DbConnection, name: impl Into<String>, sql: &str) -> Result<Self> {
        let result = conn.query(sql)?;
        Ok(Self {
            name: name.into(),
            columns: result.columns().to_vec(),
            rows: result
                .rows()
                .iter()
                .map(|row| row.values().to_vec())
                .collect(),
        })
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names, in document order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// All rows, in document order
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// One row by index
    pub fn row(&self, index: usize) -> Option<&[Option<String>]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// INSERT statement for one row of this table's shape, values escaped
    pub fn insert_sql(&self, row: &[Option<String>]) -> String {
        let values: Vec<String> = row
            .iter()
            .map(|value| match value {
                None => "NULL".to_string(),
                Some(text) => format!("'{}'", escape::escape(text)),
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            self.columns.join(", "),
            values.join(", ")
        )
    }

    fn clean_insert(&self, conn: &mut DbConnection) -> Result<()> {
        debug!(table = %self.name, rows = self.rows.len(), "loading fixture table");
        conn.query(&format!("DELETE FROM {}", self.name))?;
        for row in &self.rows {
            conn.query(&self.insert_sql(row))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// XML subset reader

struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, message: impl Into<String>) -> DbError {
        DbError::FixtureParse {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn starts_with(&self, literal: &str) -> bool {
        self.input[self.pos..].starts_with(literal.as_bytes())
    }

    fn eat(&mut self, literal: &str) -> bool {
        if self.starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, literal: &str) -> Result<()> {
        if self.eat(literal) {
            Ok(())
        } else {
            Err(self.err(format!("expected {literal:?}")))
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Skip whitespace, XML declarations/processing instructions and comments
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                self.advance_past("?>")?;
            } else if self.starts_with("<!--") {
                self.advance_past("-->")?;
            } else {
                return Ok(());
            }
        }
    }

    fn advance_past(&mut self, terminator: &str) -> Result<()> {
        let haystack = &self.input[self.pos..];
        let needle = terminator.as_bytes();
        match haystack.windows(needle.len()).position(|w| w == needle) {
            Some(found) => {
                self.pos += found + needle.len();
                Ok(())
            }
            None => Err(self.err(format!("unterminated section, expected {terminator:?}"))),
        }
    }

    fn read_name(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b':' | b'.') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err("expected a name"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    /// Read an opening tag: `<name attr="value" ...>` or `<name ... />`
    fn read_element(&mut self) -> Result<Element> {
        self.expect("<")?;
        let name = self.read_name()?;
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.eat("/>") {
                return Ok(Element {
                    name,
                    attributes,
                    self_closing: true,
                });
            }
            if self.eat(">") {
                return Ok(Element {
                    name,
                    attributes,
                    self_closing: false,
                });
            }
            let attr = self.read_name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            self.expect("\"")?;
            let value = self.read_attribute_value()?;
            attributes.push((attr, value));
        }
    }

    /// Read a closing tag for `name`
    fn read_close(&mut self, name: &str) -> Result<()> {
        self.expect("</")?;
        let found = self.read_name()?;
        if found != name {
            return Err(self.err(format!(
                "mismatched closing tag </{found}>, expected </{name}>"
            )));
        }
        self.skip_whitespace();
        self.expect(">")
    }

    fn read_attribute_value(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated attribute value")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'&') => out.push(self.read_entity()?),
                Some(_) => self.copy_plain_text(&mut out, b'"'),
            }
        }
    }

    /// Read element text content up to the next tag
    fn read_text(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some(b'<') => return Ok(out),
                Some(b'&') => out.push(self.read_entity()?),
                Some(_) => self.copy_plain_text(&mut out, b'<'),
            }
        }
    }

    /// Copy bytes into `out` until the stop byte, an entity or the end
    fn copy_plain_text(&mut self, out: &mut String, stop: u8) {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte == stop || byte == b'&' {
                break;
            }
            self.pos += 1;
        }
        out.push_str(&String::from_utf8_lossy(&self.input[start..self.pos]));
    }

    /// Decode one of the five predefined entities
    fn read_entity(&mut self) -> Result<char> {
        let entity_offset = self.pos;
        self.expect("&")?;
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte == b';' || self.pos - start > 8 {
                break;
            }
            self.pos += 1;
        }
        if self.peek() != Some(b';') {
            return Err(DbError::FixtureParse {
                offset: entity_offset,
                message: "unterminated entity".to_string(),
            });
        }
        let name = &self.input[start..self.pos];
        self.pos += 1;
        match name {
            b"lt" => Ok('<'),
            b"gt" => Ok('>'),
            b"amp" => Ok('&'),
            b"quot" => Ok('"'),
            b"apos" => Ok('\''),
            other => Err(DbError::FixtureParse {
                offset: entity_offset,
                message: format!("unknown entity &{};", String::from_utf8_lossy(other)),
            }),
        }
    }
}

fn parse_dataset(input: &str) -> Result<DataSet> {
    let mut cur = Cursor::new(input);
    cur.skip_misc()?;
    let root = cur.read_element()?;
    if root.name != "mysqldump" {
        return Err(cur.err(format!("expected <mysqldump>, found <{}>", root.name)));
    }
    let mut tables = Vec::new();
    if !root.self_closing {
        loop {
            cur.skip_misc()?;
            if cur.starts_with("</") {
                cur.read_close("mysqldump")?;
                break;
            }
            let database = cur.read_element()?;
            if database.name != "database" {
                return Err(cur.err(format!(
                    "expected <database>, found <{}>",
                    database.name
                )));
            }
            if !database.self_closing {
                parse_database(&mut cur, &mut tables)?;
            }
        }
    }
    cur.skip_misc()?;
    if cur.peek().is_some() {
        return Err(cur.err("trailing content after </mysqldump>"));
    }
    Ok(DataSet { tables })
}

fn parse_database(cur: &mut Cursor<'_>, tables: &mut Vec<TableData>) -> Result<()> {
    loop {
        cur.skip_misc()?;
        if cur.starts_with("</") {
            cur.read_close("database")?;
            return Ok(());
        }
        let element = cur.read_element()?;
        if element.name != "table_data" {
            return Err(cur.err(format!("expected <table_data>, found <{}>", element.name)));
        }
        let name = element
            .attr("name")
            .ok_or_else(|| cur.err("<table_data> requires a name attribute"))?
            .to_string();
        let mut table = TableData {
            name,
            columns: Vec::new(),
            rows: Vec::new(),
        };
        if !element.self_closing {
            parse_table_data(cur, &mut table)?;
        }
        tables.push(table);
    }
}

fn parse_table_data(cur: &mut Cursor<'_>, table: &mut TableData) -> Result<()> {
    loop {
        cur.skip_misc()?;
        if cur.starts_with("</") {
            cur.read_close("table_data")?;
            return Ok(());
        }
        let element = cur.read_element()?;
        if element.name != "row" {
            return Err(cur.err(format!("expected <row>, found <{}>", element.name)));
        }
        let (columns, values) = if element.self_closing {
            (Vec::new(), Vec::new())
        } else {
            parse_row(cur)?
        };
        if table.rows.is_empty() && table.columns.is_empty() {
            table.columns = columns;
        } else if columns != table.columns {
            return Err(cur.err(format!(
                "row fields {columns:?} do not match table {:?} columns {:?}",
                table.name, table.columns
            )));
        }
        table.rows.push(values);
    }
}

fn parse_row(cur: &mut Cursor<'_>) -> Result<(Vec<String>, Vec<Option<String>>)> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    loop {
        cur.skip_misc()?;
        if cur.starts_with("</") {
            cur.read_close("row")?;
            return Ok((columns, values));
        }
        let element = cur.read_element()?;
        if element.name != "field" {
            return Err(cur.err(format!("expected <field>, found <{}>", element.name)));
        }
        let name = element
            .attr("name")
            .ok_or_else(|| cur.err("<field> requires a name attribute"))?
            .to_string();
        let nil = element.attr("xsi:nil") == Some("true");
        let value = if element.self_closing {
            if !nil {
                return Err(cur.err(format!(
                    "field {name:?} is empty but not marked xsi:nil"
                )));
            }
            None
        } else {
            let text = cur.read_text()?;
            cur.read_close("field")?;
            if nil {
                if !text.is_empty() {
                    return Err(cur.err(format!("field {name:?} is xsi:nil but has content")));
                }
                None
            } else {
                Some(text)
            }
        };
        columns.push(name);
        values.push(value);
    }
}
