//! Storage engine trait
//!
//! The connection resource behind a [`TableAccessor`](crate::core::TableAccessor).
//! An engine owns at most one open session with the store and executes
//! already-built [`Statement`]s against it. Statement construction never
//! happens here.

use super::config::AccessorConfig;
use super::error::Result;
use super::query_builder::Statement;
use super::row::MappedRows;
use async_trait::async_trait;

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    /// Rows inserted, updated or deleted
    pub rows_affected: u64,
    /// Row identifier of the most recent successful insert on this session
    pub last_insert_id: i64,
}

/// Connection resource and statement executor
#[async_trait]
pub trait Engine: Send + Sync {
    /// Short engine name for log lines
    fn name(&self) -> &'static str;

    /// Open a session at `config.location`
    ///
    /// Fails with `ConnectionError` if the store cannot be reached or the
    /// location is unusable, and with `Timeout` past `config.operation_timeout`.
    /// A previously open session is closed first.
    async fn connect(&self, config: &AccessorConfig) -> Result<()>;

    /// Whether a session is open
    fn is_connected(&self) -> bool;

    /// Close the session
    ///
    /// Idempotent: closing a closed or never-opened engine is a no-op.
    /// The session is released even when the engine reports a close failure.
    async fn disconnect(&self) -> Result<()>;

    /// Drop the session without waiting
    ///
    /// For cleanup paths that cannot await, such as a cancelled session
    /// scope. A statement still running is interrupted and its connection
    /// is closed once it returns. No-op when nothing is open.
    fn release(&self);

    /// Liveness check against the open session
    async fn ping(&self) -> Result<()>;

    /// Execute a statement that returns no rows
    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome>;

    /// Execute a statement and fetch every row it returns
    async fn query(&self, statement: &Statement) -> Result<MappedRows>;
}
