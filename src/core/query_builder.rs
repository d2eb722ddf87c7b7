//! Parameterized SQL statement builders
//!
//! Each builder produces a [`Statement`]: statement text with positional `?`
//! placeholders plus the argument sequence to bind to them. Text and
//! arguments are emitted together from the same ordered [`ValueSet`], one
//! column at a time, so the n-th placeholder always pairs with the n-th
//! argument. Builders never touch a connection.
//!
//! Table and column names are spliced into the text as double-quoted
//! identifiers and must be plain names (ASCII letters, digits, underscore;
//! not starting with a digit), so keywords such as `order` work as column
//! names. Values are only ever bound.

use super::error::{Result, StoreError};
use super::value::Value;
use super::value_set::{Filter, ValueSet};

/// Statement text with its bound arguments in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub(crate) fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }

    /// Statement text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Arguments in placeholder order
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Number of `?` placeholders in the text
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }

    /// Split into text and arguments
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{} params]", self.sql, self.params.len())
    }
}

/// Reject names that are not plain SQL identifiers
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_argument(format!(
            "'{}' is not a valid identifier",
            name
        )))
    }
}

/// Validate a name and wrap it in double quotes for splicing
pub(crate) fn quote_identifier(name: &str) -> Result<String> {
    check_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Append `WHERE "col1" = ? AND "col2" = ?` and the matching arguments
fn push_where(sql: &mut String, params: &mut Vec<Value>, criteria: &ValueSet) -> Result<()> {
    for (i, (column, value)) in criteria.iter().enumerate() {
        let column = quote_identifier(column)?;
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        sql.push_str(&column);
        sql.push_str(" = ?");
        params.push(value.clone());
    }
    Ok(())
}

/// SELECT query builder
///
/// # Example
///
/// ```
/// use record_store::core::{Filter, SelectBuilder};
///
/// let statement = SelectBuilder::new("items")
///     .filter(Filter::by("groupName", "Band").and("sequenceNumber", 4))
///     .build()
///     .unwrap();
///
/// assert_eq!(
///     statement.sql(),
///     r#"SELECT * FROM "items" WHERE "groupName" = ? AND "sequenceNumber" = ?"#
/// );
/// assert_eq!(statement.params().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    filter: Filter,
}

impl SelectBuilder {
    /// Create a new SELECT query builder over every column and row
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: Filter::All,
        }
    }

    /// Project specific columns
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Select all columns (*)
    #[must_use]
    pub fn all_columns(mut self) -> Self {
        self.columns.clear();
        self
    }

    /// Replace the row filter
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Add a `column = value` criterion
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.and(column, value);
        self
    }

    /// Build the statement
    ///
    /// An empty filter emits no `WHERE` clause and binds nothing.
    pub fn build(&self) -> Result<Statement> {
        let table = quote_identifier(&self.table)?;

        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|column| quote_identifier(column))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projection, table);
        let mut params = Vec::new();
        if let Some(criteria) = self.filter.criteria() {
            push_where(&mut sql, &mut params, criteria)?;
        }

        Ok(Statement::new(sql, params))
    }
}

/// INSERT query builder
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    values: ValueSet,
}

impl InsertBuilder {
    /// Create a new INSERT query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: ValueSet::new(),
        }
    }

    /// Add a column-value pair
    #[must_use]
    pub fn value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.values.set(column, value);
        self
    }

    /// Use a whole value set as the row payload
    #[must_use]
    pub fn values(mut self, values: ValueSet) -> Self {
        self.values = values;
        self
    }

    /// Build the statement
    ///
    /// Fails with `InvalidArgument` when no column was given.
    pub fn build(&self) -> Result<Statement> {
        let table = quote_identifier(&self.table)?;
        if self.values.is_empty() {
            return Err(StoreError::invalid_argument(format!(
                "insert into {} needs at least one column",
                self.table
            )));
        }

        let mut columns = Vec::with_capacity(self.values.len());
        let mut params = Vec::with_capacity(self.values.len());
        for (column, value) in self.values.iter() {
            columns.push(quote_identifier(column)?);
            params.push(value.clone());
        }

        let placeholders = vec!["?"; params.len()];
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(Statement::new(sql, params))
    }
}

/// UPDATE-by-key query builder
///
/// Arguments are the new values in set order followed by the key value,
/// matching the textual order `SET ... WHERE key = ?`.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    values: ValueSet,
    key: Option<(String, Value)>,
}

impl UpdateBuilder {
    /// Create a new UPDATE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: ValueSet::new(),
            key: None,
        }
    }

    /// Set a column value
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.values.set(column, value);
        self
    }

    /// Use a whole value set as the new values
    #[must_use]
    pub fn values(mut self, values: ValueSet) -> Self {
        self.values = values;
        self
    }

    /// Locate the row by its primary key
    #[must_use]
    pub fn key(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.key = Some((column.to_string(), value.into()));
        self
    }

    /// Build the statement
    ///
    /// Fails with `InvalidArgument` when no new value or no key was given.
    pub fn build(&self) -> Result<Statement> {
        let table = quote_identifier(&self.table)?;
        if self.values.is_empty() {
            return Err(StoreError::invalid_argument(format!(
                "update of {} needs at least one column",
                self.table
            )));
        }
        let (key_column, key_value) = self.key.as_ref().ok_or_else(|| {
            StoreError::invalid_argument(format!("update of {} needs a key", self.table))
        })?;
        let key_column = quote_identifier(key_column)?;

        let mut set_clauses = Vec::with_capacity(self.values.len());
        let mut params = Vec::with_capacity(self.values.len() + 1);
        for (column, value) in self.values.iter() {
            set_clauses.push(format!("{} = ?", quote_identifier(column)?));
            params.push(value.clone());
        }
        params.push(key_value.clone());

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table,
            set_clauses.join(", "),
            key_column
        );

        Ok(Statement::new(sql, params))
    }
}

/// DELETE query builder
///
/// The filter is mandatory. `Filter::All` deletes every row; an empty
/// `Filter::Matching` set is rejected rather than read as "all".
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    filter: Filter,
}

impl DeleteBuilder {
    /// Create a new DELETE query builder
    pub fn new(table: impl Into<String>, filter: Filter) -> Self {
        Self {
            table: table.into(),
            filter,
        }
    }

    /// Build the statement
    pub fn build(&self) -> Result<Statement> {
        let mut sql = format!("DELETE FROM {}", quote_identifier(&self.table)?);
        let mut params = Vec::new();
        match &self.filter {
            Filter::All => {}
            Filter::Matching(criteria) if criteria.is_empty() => {
                return Err(StoreError::invalid_argument(format!(
                    "delete from {} with empty criteria; use Filter::All to delete every row",
                    self.table
                )));
            }
            Filter::Matching(criteria) => push_where(&mut sql, &mut params, criteria)?,
        }

        Ok(Statement::new(sql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ValueSet {
        ValueSet::new()
            .with("id", "s1")
            .with("groupName", "Band")
            .with("collectionName", "Album")
            .with("sequenceNumber", 4)
            .with("label", "Track")
    }

    #[test]
    fn test_select_basic() {
        let statement = SelectBuilder::new("items").build().unwrap();
        assert_eq!(statement.sql(), r#"SELECT * FROM "items""#);
        assert!(statement.params().is_empty());
    }

    #[test]
    fn test_select_columns() {
        let statement = SelectBuilder::new("items")
            .columns(&["id", "label"])
            .build()
            .unwrap();
        assert_eq!(statement.sql(), r#"SELECT "id", "label" FROM "items""#);
    }

    #[test]
    fn test_select_empty_matching_set_has_no_where() {
        let statement = SelectBuilder::new("items")
            .filter(Filter::Matching(ValueSet::new()))
            .build()
            .unwrap();
        assert_eq!(statement.sql(), r#"SELECT * FROM "items""#);
        assert_eq!(statement.placeholder_count(), 0);
    }

    #[test]
    fn test_select_where() {
        let statement = SelectBuilder::new("items")
            .where_eq("id", "s1")
            .where_eq("label", "Track")
            .build()
            .unwrap();

        assert_eq!(
            statement.sql(),
            r#"SELECT * FROM "items" WHERE "id" = ? AND "label" = ?"#
        );
        assert_eq!(statement.params(), [Value::from("s1"), Value::from("Track")]);
    }

    #[test]
    fn test_insert() {
        let statement = InsertBuilder::new("items").values(item()).build().unwrap();

        assert_eq!(
            statement.sql(),
            r#"INSERT INTO "items" ("id", "groupName", "collectionName", "sequenceNumber", "label") VALUES (?, ?, ?, ?, ?)"#
        );
        let expected: Vec<Value> = item().values().cloned().collect();
        assert_eq!(statement.params(), expected.as_slice());
    }

    #[test]
    fn test_insert_requires_values() {
        let err = InsertBuilder::new("items").build().unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_update_binds_values_then_key() {
        let statement = UpdateBuilder::new("items")
            .set("label", "NewTrack")
            .set("sequenceNumber", 5)
            .key("id", "s1")
            .build()
            .unwrap();

        assert_eq!(
            statement.sql(),
            r#"UPDATE "items" SET "label" = ?, "sequenceNumber" = ? WHERE "id" = ?"#
        );
        assert_eq!(
            statement.params(),
            [Value::from("NewTrack"), Value::Integer(5), Value::from("s1")]
        );
    }

    #[test]
    fn test_update_requires_values_and_key() {
        let err = UpdateBuilder::new("items").key("id", "s1").build().unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let err = UpdateBuilder::new("items").set("label", "x").build().unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_delete() {
        let statement = DeleteBuilder::new("items", Filter::by("id", "s1"))
            .build()
            .unwrap();
        assert_eq!(statement.sql(), r#"DELETE FROM "items" WHERE "id" = ?"#);
        assert_eq!(statement.params(), [Value::from("s1")]);
    }

    #[test]
    fn test_delete_all_is_explicit() {
        let statement = DeleteBuilder::new("items", Filter::All).build().unwrap();
        assert_eq!(statement.sql(), r#"DELETE FROM "items""#);
        assert!(statement.params().is_empty());

        let err = DeleteBuilder::new("items", Filter::Matching(ValueSet::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_identifiers_are_checked() {
        assert!(check_identifier("groupName").is_ok());
        assert!(check_identifier("_links").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("1abc").is_err());
        assert!(check_identifier("a b").is_err());
        assert!(check_identifier("id=1 OR 1").is_err());

        let err = SelectBuilder::new("items")
            .where_eq("id = 1 OR id", "s1")
            .build()
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_keywords_are_quoted() {
        let statement = SelectBuilder::new("order")
            .columns(&["group", "select"])
            .where_eq("where", 1)
            .build()
            .unwrap();
        assert_eq!(
            statement.sql(),
            r#"SELECT "group", "select" FROM "order" WHERE "where" = ?"#
        );

        let statement = UpdateBuilder::new("order")
            .set("group", "Band")
            .key("index", 1)
            .build()
            .unwrap();
        assert_eq!(
            statement.sql(),
            r#"UPDATE "order" SET "group" = ? WHERE "index" = ?"#
        );
    }

    #[test]
    fn test_values_containing_question_marks_stay_bound() {
        let statement = InsertBuilder::new("items")
            .value("label", "Why?")
            .build()
            .unwrap();
        assert_eq!(statement.placeholder_count(), 1);
        assert_eq!(statement.params(), [Value::from("Why?")]);
    }
}
