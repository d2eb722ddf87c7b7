//! # Record Store
//!
//! A small record-storage façade over SQLite. Tables are created, and rows
//! inserted, selected, updated and deleted, from table names and ordered
//! column/value sets supplied at call time rather than per-table code.
//!
//! ## Features
//!
//! - **Parameterized statements**: values are always bound; statement text and
//!   arguments are produced together so placeholders and arguments line up
//! - **Ordered value sets**: column order is preserved from caller to statement
//! - **Explicit lifecycle**: an accessor is disconnected until `open` and
//!   refuses work until then; `close` is idempotent
//! - **Typed errors**: engine failures are distinct from empty results
//! - **Deadlines**: every engine call is bounded by a configurable timeout
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use record_store::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let accessor = TableAccessor::new(AccessorConfig::memory());
//!     accessor.open().await?;
//!
//!     accessor
//!         .create_table(
//!             &TableSchema::new("items")
//!                 .primary_key("id")
//!                 .column(ColumnSpec::text("id"))
//!                 .column(ColumnSpec::text("label"))
//!                 .column(ColumnSpec::integer("sequenceNumber")),
//!         )
//!         .await?;
//!
//!     let item = ValueSet::new()
//!         .with("id", "s1")
//!         .with("label", "Track")
//!         .with("sequenceNumber", 4);
//!     accessor.insert("items", &item).await?;
//!
//!     accessor
//!         .update_by_key("items", "id", "s1", &ValueSet::new().with("label", "NewTrack"))
//!         .await?;
//!
//!     for row in accessor.select("items", &Filter::by("id", "s1")).await?.iter() {
//!         println!("{}", row.to_json());
//!     }
//!
//!     accessor.delete("items", &Filter::by("id", "s1")).await?;
//!     accessor.close().await
//! }
//! ```
//!
//! ### Scoped sessions
//!
//! ```rust,no_run
//! use record_store::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let count = TableAccessor::scoped(AccessorConfig::file("db_file.db"), |db| {
//!         Box::pin(async move { Ok(db.select("items", &Filter::All).await?.len()) })
//!     })
//!     .await?;
//!     println!("{} items", count);
//!     Ok(())
//! }
//! ```

/// Core record store types and traits
pub mod core;

/// Storage engine implementations
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use record_store::prelude::*;
///
/// let values = ValueSet::new().with("id", "s1");
/// assert_eq!(values.len(), 1);
/// ```
pub mod prelude {
    pub use crate::core::{
        AccessorConfig, ColumnSpec, Filter, Location, MappedRows, Result, Row, StoreError,
        TableAccessor, TableSchema, Value, ValueSet,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteEngine;
}

// Re-export at root level for convenience
pub use core::{
    AccessorConfig, ColumnSpec, Filter, Location, MappedRows, Result, Row, StoreError,
    TableAccessor, TableSchema, Value, ValueSet,
};

#[cfg(feature = "sqlite")]
pub use backends::SqliteEngine;

/// SQLite-backed table accessor
#[cfg(feature = "sqlite")]
pub type SqliteAccessor = TableAccessor<SqliteEngine>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let filter = Filter::by("id", "s1");
        assert_eq!(filter.criteria().map(|c| c.len()), Some(1));
        assert!(AccessorConfig::default().location.is_memory());
    }

    #[test]
    fn test_value_conversions() {
        use prelude::*;

        let val: Value = 42.into();
        assert_eq!(val.as_i64(), Some(42));

        let val: Value = "test".into();
        assert_eq!(val.as_str(), Some("test"));

        let val: Value = true.into();
        assert_eq!(val.as_bool(), Some(true));
    }
}
