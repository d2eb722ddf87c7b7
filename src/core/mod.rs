//! Core record store types and traits
//!
//! This module provides the building blocks of the record store: values and
//! ordered value sets, the schema and statement builders, row mapping, the
//! engine trait and the table accessor that ties them together.

pub mod accessor;
pub mod config;
pub mod engine;
pub mod error;
pub mod query_builder;
pub mod row;
pub mod schema;
pub mod value;
pub mod value_set;

// Re-export commonly used types
pub use accessor::{SessionFuture, TableAccessor};
pub use config::{AccessorConfig, Location};
pub use engine::{Engine, ExecOutcome};
pub use error::{Result, StoreError};
pub use query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder, Statement, UpdateBuilder};
pub use row::{map_rows, MappedRows, Row};
pub use schema::{build_create_table, ColumnSpec, TableSchema};
pub use value::Value;
pub use value_set::{Filter, ValueSet};
