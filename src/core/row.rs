//! Row mapping
//!
//! Converts positional result tuples plus their column names into [`Row`]s
//! keyed by column name, so callers never depend on positional indices.

use super::error::{Result, StoreError};
use super::value::Value;
use super::value_set::ValueSet;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// One record returned by a select, keyed by column name in result order
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Look up a column's value
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|index| &self.values[index])
    }

    /// Column names in result order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in result order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Column/value pairs in result order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render the row as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(name, value)| {
                    let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                    (name.to_string(), json)
                })
                .collect(),
        )
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl From<Row> for ValueSet {
    fn from(row: Row) -> Self {
        row.columns.iter().cloned().zip(row.values).collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Detached, fully-fetched result of a select
///
/// Holds no reference to the connection, so it stays valid after the store
/// is closed. Rows are assembled on demand; iterating again rebuilds them.
#[derive(Debug, Clone)]
pub struct MappedRows {
    columns: Arc<[String]>,
    raw: Vec<Vec<Value>>,
}

impl MappedRows {
    /// Column names shared by every row
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the result is empty
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Row at `index`
    pub fn get(&self, index: usize) -> Option<Row> {
        self.raw.get(index).map(|values| self.row(values.clone()))
    }

    /// First row, if any
    pub fn first(&self) -> Option<Row> {
        self.get(0)
    }

    /// Iterate rows in result order
    pub fn iter(&self) -> impl Iterator<Item = Row> + '_ {
        self.raw.iter().map(|values| self.row(values.clone()))
    }

    /// Collect every row
    pub fn to_vec(&self) -> Vec<Row> {
        self.iter().collect()
    }

    fn row(&self, values: Vec<Value>) -> Row {
        Row {
            columns: Arc::clone(&self.columns),
            values,
        }
    }
}

impl IntoIterator for MappedRows {
    type Item = Row;
    type IntoIter = std::iter::Map<
        std::iter::Zip<std::iter::Repeat<Arc<[String]>>, std::vec::IntoIter<Vec<Value>>>,
        fn((Arc<[String]>, Vec<Value>)) -> Row,
    >;

    fn into_iter(self) -> Self::IntoIter {
        std::iter::repeat(self.columns)
            .zip(self.raw)
            .map(assemble as fn((Arc<[String]>, Vec<Value>)) -> Row)
    }
}

fn assemble((columns, values): (Arc<[String]>, Vec<Value>)) -> Row {
    Row { columns, values }
}

/// Zip each raw row with `columns`
///
/// Fails with `SchemaMismatch` if any raw row's arity differs from the
/// number of column names.
pub fn map_rows(columns: Vec<String>, raw: Vec<Vec<Value>>) -> Result<MappedRows> {
    if let Some(bad) = raw.iter().find(|values| values.len() != columns.len()) {
        return Err(StoreError::schema_mismatch(columns.len(), bad.len()));
    }

    Ok(MappedRows {
        columns: columns.into(),
        raw,
    })
}
