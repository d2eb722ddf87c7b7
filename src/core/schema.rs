//! Table schema builder
//!
//! Turns a table name, an optional primary-key column and an ordered list of
//! column declarations into an idempotent `CREATE TABLE IF NOT EXISTS`
//! statement, and checks an existing table's shape against that request.

use super::error::{Result, StoreError};
use super::query_builder::{quote_identifier, Statement};
use super::row::MappedRows;

/// Words that end the type name and start a column constraint
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "constraint",
    "primary",
    "not",
    "null",
    "unique",
    "check",
    "default",
    "collate",
    "references",
    "generated",
    "as",
];

/// A single column declaration
///
/// The declared type may carry column constraints (`text not null`,
/// `integer unique`); they are emitted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    name: String,
    declared_type: String,
}

impl ColumnSpec {
    /// Declare a column; the type is lower-cased and otherwise passed through
    pub fn new(name: impl Into<String>, declared_type: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.as_ref().to_lowercase(),
        }
    }

    /// Declare an `integer` column
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, "integer")
    }

    /// Declare a `text` column
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, "text")
    }

    /// Declare a `real` column
    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, "real")
    }

    /// Declare a `blob` column
    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, "blob")
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased declared type
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    /// Type name without constraints and whitespace, as `table_info` reports it
    fn type_name(&self) -> String {
        self.declared_type
            .split_whitespace()
            .take_while(|token| !is_constraint_keyword(token))
            .collect()
    }

    /// Whether the declared type itself carries a `primary key` constraint
    fn declares_primary_key(&self) -> bool {
        let tokens: Vec<&str> = self.declared_type.split_whitespace().collect();
        tokens
            .windows(2)
            .any(|pair| pair[0] == "primary" && pair[1].starts_with("key"))
    }
}

fn is_constraint_keyword(token: &str) -> bool {
    let word = token
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or("");
    CONSTRAINT_KEYWORDS.contains(&word)
}

/// Shape of a table: name, optional primary key and ordered columns
///
/// # Example
///
/// ```
/// use record_store::core::{ColumnSpec, TableSchema};
///
/// let schema = TableSchema::new("songs")
///     .primary_key("song_id")
///     .column(ColumnSpec::text("song_id"))
///     .column(ColumnSpec::text("band"))
///     .column(ColumnSpec::integer("nr"));
///
/// let statement = schema.build().unwrap();
/// assert_eq!(
///     statement.sql(),
///     r#"CREATE TABLE IF NOT EXISTS "songs" ("song_id" text PRIMARY KEY, "band" text, "nr" integer)"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
    primary_key: Option<String>,
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Start a schema for `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: None,
            columns: Vec::new(),
        }
    }

    /// Name the primary-key column
    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Append a column declaration
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Append several column declarations from `(name, type)` pairs
    #[must_use]
    pub fn columns<N, T, I>(mut self, columns: I) -> Self
    where
        N: Into<String>,
        T: AsRef<str>,
        I: IntoIterator<Item = (N, T)>,
    {
        self.columns
            .extend(columns.into_iter().map(|(name, ty)| ColumnSpec::new(name, ty)));
        self
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared primary-key column, if any
    pub fn primary_key_column(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Column declarations in order
    pub fn column_specs(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Build the `CREATE TABLE IF NOT EXISTS` statement
    pub fn build(&self) -> Result<Statement> {
        build_create_table(&self.table, self.primary_key.as_deref(), &self.columns)
    }
}

/// Build an idempotent create-table statement
///
/// Columns appear in the order given. The column whose name equals
/// `primary_key` gets a `PRIMARY KEY` suffix. A primary key that names no
/// column emits no constraint and only logs a warning.
pub fn build_create_table(
    table: &str,
    primary_key: Option<&str>,
    columns: &[ColumnSpec],
) -> Result<Statement> {
    let quoted_table = quote_identifier(table)?;
    if columns.is_empty() {
        return Err(StoreError::invalid_argument(format!(
            "table {} needs at least one column",
            table
        )));
    }

    let mut declarations = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let quoted_column = quote_identifier(&column.name)?;
        if columns[..i]
            .iter()
            .any(|earlier| earlier.name.eq_ignore_ascii_case(&column.name))
        {
            return Err(StoreError::invalid_argument(format!(
                "column {} declared twice",
                column.name
            )));
        }

        let mut declaration = format!("{} {}", quoted_column, column.declared_type);
        if primary_key == Some(column.name.as_str()) {
            declaration.push_str(" PRIMARY KEY");
        }
        declarations.push(declaration);
    }

    if let Some(key) = primary_key {
        if !columns.iter().any(|column| column.name == key) {
            log::warn!(
                "primary key {} matches no column of table {}; no constraint emitted",
                key,
                table
            );
        }
    }

    Ok(Statement::new(
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quoted_table,
            declarations.join(", ")
        ),
        Vec::new(),
    ))
}

/// Build the statement that reads back a table's column layout
pub fn build_table_info(table: &str) -> Result<Statement> {
    Ok(Statement::new(
        format!("PRAGMA table_info({})", quote_identifier(table)?),
        Vec::new(),
    ))
}

/// Compare an existing table's `table_info` rows against the requested shape
///
/// Column names, type names and the primary-key flag must match position by
/// position. Constraints after the type name (`not null`, `unique`, ...) are
/// not reported by `table_info` and are not compared.
pub fn verify_shape(schema: &TableSchema, table_info: &MappedRows) -> Result<()> {
    let conflict = |message: String| StoreError::schema_conflict(schema.table(), message);

    if table_info.len() != schema.columns.len() {
        return Err(conflict(format!(
            "existing table has {} columns, requested {}",
            table_info.len(),
            schema.columns.len()
        )));
    }

    for (position, (existing, requested)) in table_info.iter().zip(&schema.columns).enumerate() {
        let name = existing.get("name").and_then(|v| v.as_str()).unwrap_or("");
        let declared_type: String = existing
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_lowercase()
            .split_whitespace()
            .collect();
        let requested_type = requested.type_name();
        let is_key = existing
            .get("pk")
            .and_then(|v| v.as_i64())
            .is_some_and(|pk| pk > 0);
        let wants_key = schema.primary_key.as_deref() == Some(requested.name.as_str())
            || requested.declares_primary_key();

        if !name.eq_ignore_ascii_case(&requested.name)
            || declared_type != requested_type
            || is_key != wants_key
        {
            return Err(conflict(format!(
                "column {} is '{} {}{}', requested '{} {}{}'",
                position,
                name,
                declared_type,
                if is_key { " primary key" } else { "" },
                requested.name,
                requested_type,
                if wants_key { " primary key" } else { "" },
            )));
        }
    }

    Ok(())
}
