//! Schema index built from a markdown-style schema description.
//!
//! The description is line oriented:
//!
//! ```text
//! ### products
//! - id: integer, primary key
//! - name: product title
//!   - ingredients: free-text list
//!
//! ### orders
//! - id: integer
//! ```
//!
//! A heading line (`###` followed by whitespace and an identifier) opens a
//! table; every following line that starts with an identifier and a colon,
//! after any leading spaces, tabs or hyphens, declares a column of that table.
//! Anything else is skipped.

use nom::{
    bytes::complete::take_while1,
    character::complete::char,
    sequence::{preceded, terminated},
    IResult,
};
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{debug, trace};

use crate::config::SchemaConfig;
use crate::error::{RouterError, RouterResult};

/// A fully-qualified `table.column` reference, lowercase ASCII.
///
/// There is intentionally no way to deserialize one: references only come
/// out of a [`SchemaIndex`], so every value in circulation names a real column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ColumnRef(String);

impl ColumnRef {
    fn new(table: &str, column: &str) -> Self {
        Self(format!("{}.{}", table, column))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The table half of the reference.
    pub fn table(&self) -> &str {
        self.0.split_once('.').map(|(t, _)| t).unwrap_or(&self.0)
    }

    /// The column half of the reference.
    pub fn column(&self) -> &str {
        self.0.split_once('.').map(|(_, c)| c).unwrap_or("")
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ColumnRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ColumnRef {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ColumnRef {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ColumnRef {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One table and its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableColumns {
    pub name: String,
    pub columns: Vec<String>,
}

/// Normalized, order-preserving view of every known table and column.
///
/// `flat_columns` and the position lookup are derived from `tables` when the
/// index is constructed and never touched again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaIndex {
    tables: Vec<TableColumns>,
    flat_columns: Vec<ColumnRef>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl SchemaIndex {
    /// Parse a schema description with the default heading marker.
    pub fn parse(text: &str) -> Self {
        SchemaIndexBuilder::default().build(text)
    }

    /// Load and parse a schema description file.
    pub fn from_path(path: impl AsRef<Path>) -> RouterResult<Self> {
        SchemaIndexBuilder::default().build_from_path(path)
    }

    /// Read and parse a schema description from any reader.
    pub fn from_reader(reader: impl Read) -> RouterResult<Self> {
        SchemaIndexBuilder::default().build_from_reader(reader)
    }

    /// Build an index directly from `(table, columns)` pairs.
    ///
    /// Names are lowercased. A table named twice keeps its first slot and
    /// takes the later column list.
    pub fn from_tables<T, C, S>(tables: T) -> Self
    where
        T: IntoIterator<Item = (S, C)>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut acc = TableAccumulator::default();
        for (table, columns) in tables {
            acc.open(table.as_ref());
            for column in columns {
                acc.push_column(column.as_ref());
            }
        }
        acc.finish()
    }

    fn from_table_list(tables: Vec<TableColumns>) -> Self {
        let flat_columns: Vec<ColumnRef> = tables
            .iter()
            .flat_map(|t| t.columns.iter().map(move |c| ColumnRef::new(&t.name, c)))
            .collect();

        let mut positions = HashMap::with_capacity(flat_columns.len());
        for (i, col) in flat_columns.iter().enumerate() {
            positions.entry(col.as_str().to_string()).or_insert(i);
        }

        Self {
            tables,
            flat_columns,
            positions,
        }
    }

    /// Tables in declaration order.
    pub fn tables(&self) -> &[TableColumns] {
        &self.tables
    }

    /// Columns of one table, if it exists.
    pub fn table(&self, name: &str) -> Option<&[String]> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.columns.as_slice())
    }

    /// Every column reference, table order first, then column order.
    pub fn flat_columns(&self) -> &[ColumnRef] {
        &self.flat_columns
    }

    /// The first `limit` flat columns, for embedding into an oracle prompt.
    pub fn known_columns(&self, limit: usize) -> &[ColumnRef] {
        &self.flat_columns[..limit.min(self.flat_columns.len())]
    }

    /// Position of the first occurrence of a reference in `flat_columns`.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    /// The canonical reference for an untrusted string, exact matches only.
    pub fn resolve(&self, raw: &str) -> Option<&ColumnRef> {
        self.flat_columns.get(self.position(raw)?)
    }

    /// Number of flat column references (duplicates included).
    pub fn len(&self) -> usize {
        self.flat_columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat_columns.is_empty()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

/// Parses schema descriptions into a [`SchemaIndex`].
#[derive(Debug, Clone)]
pub struct SchemaIndexBuilder {
    heading_marker: String,
}

impl Default for SchemaIndexBuilder {
    fn default() -> Self {
        Self::new(&SchemaConfig::default())
    }
}

impl SchemaIndexBuilder {
    pub fn new(config: &SchemaConfig) -> Self {
        Self {
            heading_marker: config.heading_marker.clone(),
        }
    }

    /// Parse schema text. Never fails; unrecognized lines are skipped.
    pub fn build(&self, text: &str) -> SchemaIndex {
        let mut acc = TableAccumulator::default();

        for (lineno, line) in text.lines().enumerate() {
            if let Some(table) = parse_heading(line, &self.heading_marker) {
                acc.open(table);
                continue;
            }

            match parse_column(line) {
                Some(column) if acc.has_active() => acc.push_column(column),
                Some(column) => trace!(line = lineno + 1, column, "column before any table heading"),
                None => trace!(line = lineno + 1, "skipped schema line"),
            }
        }

        let index = acc.finish();
        debug!(
            tables = index.table_count(),
            columns = index.len(),
            "schema index built"
        );
        index
    }

    pub fn build_from_reader(&self, mut reader: impl Read) -> RouterResult<SchemaIndex> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(RouterError::schema_stream)?;
        Ok(self.build(&text))
    }

    pub fn build_from_path(&self, path: impl AsRef<Path>) -> RouterResult<SchemaIndex> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| RouterError::schema_file(path, e))?;
        Ok(self.build(&text))
    }
}

/// Collects tables in first-appearance order.
#[derive(Default)]
struct TableAccumulator {
    tables: Vec<TableColumns>,
    active: Option<usize>,
}

impl TableAccumulator {
    fn open(&mut self, name: &str) {
        let name = name.to_ascii_lowercase();
        let idx = match self.tables.iter().position(|t| t.name == name) {
            Some(idx) => {
                self.tables[idx].columns.clear();
                idx
            }
            None => {
                self.tables.push(TableColumns {
                    name,
                    columns: Vec::new(),
                });
                self.tables.len() - 1
            }
        };
        self.active = Some(idx);
    }

    fn has_active(&self) -> bool {
        self.active.is_some()
    }

    fn push_column(&mut self, column: &str) {
        if let Some(idx) = self.active {
            self.tables[idx].columns.push(column.to_ascii_lowercase());
        }
    }

    fn finish(self) -> SchemaIndex {
        SchemaIndex::from_table_list(self.tables)
    }
}

/// Parse an identifier (table name, column name).
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

/// Parse a table heading: marker, whitespace, identifier.
fn parse_heading<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(marker)?;
    let result: IResult<&str, &str> =
        preceded(take_while1(|c: char| c.is_whitespace()), parse_identifier)(rest);
    result.ok().map(|(_, name)| name)
}

/// Parse a column declaration: optional list markers, identifier, colon.
fn parse_column(line: &str) -> Option<&str> {
    let line = line.trim_start_matches([' ', '\t', '-']);
    let result: IResult<&str, &str> = terminated(parse_identifier, char(':'))(line);
    result.ok().map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = "\
# Shop database

### Products
- id: integer
- name: product title
- Ingredients: free text

### orders
  - id: integer
\t- customer_id: references customers.id
notes without a colon
- total_price_cents: integer
";

    #[test]
    fn test_heading_and_columns() {
        let index = SchemaIndex::parse(SHOP);
        assert_eq!(index.table_count(), 2);
        assert_eq!(
            index.table("products"),
            Some(&["id".to_string(), "name".to_string(), "ingredients".to_string()][..])
        );
        assert_eq!(
            index.flat_columns(),
            &[
                "products.id",
                "products.name",
                "products.ingredients",
                "orders.id",
                "orders.customer_id",
                "orders.total_price_cents",
            ]
        );
    }

    #[test]
    fn test_column_before_heading_dropped() {
        let index = SchemaIndex::parse("- id: integer\n### users\n- email: text\n");
        assert_eq!(index.flat_columns(), &["users.email"]);
    }

    #[test]
    fn test_duplicate_columns_kept() {
        let index = SchemaIndex::parse("### t\n- a: x\n- a: y\n");
        assert_eq!(index.flat_columns(), &["t.a", "t.a"]);
        assert_eq!(index.position("t.a"), Some(0));
    }

    #[test]
    fn test_repeated_heading_resets_columns() {
        let index = SchemaIndex::parse("### a\n- x: 1\n### b\n- y: 1\n### a\n- z: 1\n");
        assert_eq!(index.flat_columns(), &["a.z", "b.y"]);
    }

    #[test]
    fn test_heading_requires_whitespace() {
        assert_eq!(parse_heading("###users", "###"), None);
        assert_eq!(parse_heading("#### users", "###"), None);
        assert_eq!(parse_heading("###   users (core)", "###"), Some("users"));
        assert_eq!(parse_heading("## users", "###"), None);
    }

    #[test]
    fn test_column_line_shapes() {
        assert_eq!(parse_column("- id: integer"), Some("id"));
        assert_eq!(parse_column(" \t-- created_at:"), Some("created_at"));
        assert_eq!(parse_column("- id : integer"), None);
        assert_eq!(parse_column("* id: integer"), None);
        assert_eq!(parse_column(""), None);
    }

    #[test]
    fn test_custom_heading_marker() {
        let config = SchemaConfig {
            heading_marker: "TABLE".to_string(),
        };
        let index = SchemaIndexBuilder::new(&config).build("TABLE users\n- id: int\n### x\n");
        assert_eq!(index.flat_columns(), &["users.id"]);
    }

    #[test]
    fn test_known_columns_truncates() {
        let index = SchemaIndex::parse(SHOP);
        assert_eq!(index.known_columns(2), &["products.id", "products.name"]);
        assert_eq!(index.known_columns(100).len(), 6);
        assert!(index.known_columns(0).is_empty());
    }

    #[test]
    fn test_resolve_untrusted() {
        let index = SchemaIndex::parse(SHOP);
        assert_eq!(
            index.resolve("products.name").map(ColumnRef::as_str),
            Some("products.name")
        );
        assert_eq!(index.resolve("Products.Name"), None);
        assert_eq!(index.resolve(" products.name "), None);
        assert_eq!(index.resolve("products.fake_col"), None);
    }

    #[test]
    fn test_column_ref_parts() {
        let index = SchemaIndex::from_tables([("Orders", vec!["Customer_ID"])]);
        let col = &index.flat_columns()[0];
        assert_eq!(col.table(), "orders");
        assert_eq!(col.column(), "customer_id");
        assert_eq!(col.to_string(), "orders.customer_id");
    }

    #[test]
    fn test_empty_text() {
        let index = SchemaIndex::parse("");
        assert!(index.is_empty());
        assert_eq!(index.table_count(), 0);
    }
}
