//! Ordered column/value sets and row filters
//!
//! A [`ValueSet`] carries the payload of an insert or update, or the criteria
//! of a select or delete. Iteration order is insertion order, which is the
//! order columns appear in generated statement text and in the bound
//! argument sequence.

use super::value::Value;

/// Ordered mapping from column name to value
///
/// Column names are distinct: setting a column that is already present
/// replaces its value in place and keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSet {
    entries: Vec<(String, Value)>,
}

impl ValueSet {
    /// Create an empty value set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column/value pair (builder style)
    ///
    /// # Example
    ///
    /// ```
    /// use record_store::core::ValueSet;
    ///
    /// let values = ValueSet::new()
    ///     .with("groupName", "Band")
    ///     .with("sequenceNumber", 4);
    /// assert_eq!(values.columns().collect::<Vec<_>>(), ["groupName", "sequenceNumber"]);
    /// ```
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column's value, replacing any earlier value for the same column
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Remove a column, returning its value
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(name, _)| name == column)?;
        Some(self.entries.remove(index).1)
    }

    /// Look up a column's value
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no columns
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Values in column order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    /// Column/value pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ValueSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for (column, value) in iter {
            set.set(column, value);
        }
        set
    }
}

impl IntoIterator for ValueSet {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Row restriction for select and delete
///
/// `All` is the explicit marker for "every row". A delete only wipes a table
/// when it is handed `Filter::All`; an empty `Matching` set is rejected there.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// No restriction
    All,
    /// Rows whose columns equal every given value
    Matching(ValueSet),
}

impl Filter {
    /// Restrict to rows where `column` equals `value`
    pub fn by(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Matching(ValueSet::new().with(column, value))
    }

    /// Add another equality criterion
    ///
    /// Turns `Filter::All` into a single-criterion `Matching` filter.
    #[must_use]
    pub fn and(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        match self {
            Filter::All => Filter::by(column, value),
            Filter::Matching(set) => Filter::Matching(set.with(column, value)),
        }
    }

    /// Criteria of this filter, `None` for `All`
    pub fn criteria(&self) -> Option<&ValueSet> {
        match self {
            Filter::All => None,
            Filter::Matching(set) => Some(set),
        }
    }
}

impl From<ValueSet> for Filter {
    fn from(set: ValueSet) -> Self {
        Filter::Matching(set)
    }
}
