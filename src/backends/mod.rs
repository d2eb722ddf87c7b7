//! Storage engine implementations
//!
//! This module contains concrete implementations of the Engine trait.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEngine;
