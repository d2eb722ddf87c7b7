//! Table accessor
//!
//! The public CRUD surface. Every operation runs the same sequence: check
//! the session is open, build the statement, execute it, map rows (select
//! only) and report the outcome. Failures propagate unchanged; an engine
//! failure is never reported as an empty result.
//!
//! An accessor is either disconnected (initial and terminal) or connected
//! (between [`open`](TableAccessor::open) and [`close`](TableAccessor::close)).
//! Operations on a disconnected accessor fail with `NotConnected`; nothing
//! connects implicitly.
//!
//! # Concurrency
//!
//! Each call runs one statement to completion before returning. An accessor
//! is meant for one caller at a time: share it behind a mutex or open one
//! accessor per worker.

use super::config::AccessorConfig;
use super::engine::{Engine, ExecOutcome};
use super::error::{Result, StoreError};
use super::query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder, Statement, UpdateBuilder};
use super::row::MappedRows;
use super::schema::{build_table_info, verify_shape, TableSchema};
use super::value::Value;
use super::value_set::{Filter, ValueSet};
use std::future::Future;
use std::pin::Pin;

/// Future returned by a session closure
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Dynamic CRUD façade over one storage engine session
pub struct TableAccessor<E: Engine> {
    config: AccessorConfig,
    engine: E,
}

#[cfg(feature = "sqlite")]
impl TableAccessor<crate::backends::SqliteEngine> {
    /// Create a disconnected SQLite-backed accessor
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use record_store::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<()> {
    ///     let accessor = TableAccessor::new(AccessorConfig::file("db_file.db"));
    ///     accessor.open().await?;
    ///
    ///     accessor
    ///         .create_table(
    ///             &TableSchema::new("items")
    ///                 .primary_key("id")
    ///                 .columns([("id", "text"), ("label", "text")]),
    ///         )
    ///         .await?;
    ///     accessor
    ///         .insert("items", &ValueSet::new().with("id", "s1").with("label", "Track"))
    ///         .await?;
    ///
    ///     let rows = accessor.select("items", &Filter::by("id", "s1")).await?;
    ///     assert_eq!(rows.len(), 1);
    ///
    ///     accessor.close().await
    /// }
    /// ```
    pub fn new(config: AccessorConfig) -> Self {
        Self::with_engine(config, crate::backends::SqliteEngine::new())
    }

    /// Open a SQLite store, run `f`, and close the store on every exit path
    ///
    /// Returns `f`'s error if it failed, otherwise any error from closing.
    pub async fn scoped<F, T>(config: AccessorConfig, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a Self) -> SessionFuture<'a, T> + Send,
        T: Send,
    {
        Self::new(config).with_session(f).await
    }
}

impl<E: Engine> TableAccessor<E> {
    /// Create a disconnected accessor over a specific engine
    pub fn with_engine(config: AccessorConfig, engine: E) -> Self {
        Self { config, engine }
    }

    /// Accessor configuration
    pub fn config(&self) -> &AccessorConfig {
        &self.config
    }

    /// Underlying engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Open the store
    ///
    /// A no-op when already connected.
    pub async fn open(&self) -> Result<()> {
        if self.engine.is_connected() {
            return Ok(());
        }
        self.engine.connect(&self.config).await
    }

    /// Close the store
    ///
    /// Idempotent: closing a disconnected accessor is a no-op.
    pub async fn close(&self) -> Result<()> {
        self.engine.disconnect().await
    }

    /// Whether a session is open
    pub fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    /// Liveness check
    pub async fn ping(&self) -> Result<()> {
        self.ensure_connected()?;
        self.engine.ping().await
    }

    /// Open, run `f`, and close on every exit path
    ///
    /// Returns `f`'s error if it failed, otherwise any error from closing.
    /// A session the caller already opened is left open. If the returned
    /// future is dropped before it finishes, the session this call opened is
    /// released without waiting.
    pub async fn with_session<F, T>(&self, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a Self) -> SessionFuture<'a, T> + Send,
        T: Send,
    {
        let opened = !self.is_connected();
        self.open().await?;
        let mut guard = SessionGuard {
            engine: &self.engine,
            armed: opened,
        };

        let result = f(self).await;
        let closed = if opened { self.close().await } else { Ok(()) };
        guard.armed = false;

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
        }
    }

    /// Create a table if it does not exist
    ///
    /// Idempotent for an identical shape. An existing table with a different
    /// shape fails with `SchemaConflict`.
    pub async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        self.ensure_connected()?;
        let statement = schema.build()?;
        self.run(&statement).await?;

        let info = build_table_info(schema.table())?;
        let existing = self.engine.query(&info).await?;
        verify_shape(schema, &existing)
    }

    /// Insert one row, returning the engine's row identifier
    ///
    /// Fails with `InvalidArgument` for an empty value set and with
    /// `ConstraintViolation` for a duplicate key. There is no implicit
    /// existence check.
    pub async fn insert(&self, table: &str, values: &ValueSet) -> Result<i64> {
        self.ensure_connected()?;
        let statement = InsertBuilder::new(table).values(values.clone()).build()?;
        let outcome = self.run(&statement).await?;
        Ok(outcome.last_insert_id)
    }

    /// Fetch every column of the rows matching `filter`
    ///
    /// No match is an empty, successful result.
    pub async fn select(&self, table: &str, filter: &Filter) -> Result<MappedRows> {
        self.select_columns(table, &[], filter).await
    }

    /// Fetch the given columns of the rows matching `filter`
    ///
    /// An empty projection selects every column.
    pub async fn select_columns(
        &self,
        table: &str,
        columns: &[&str],
        filter: &Filter,
    ) -> Result<MappedRows> {
        self.ensure_connected()?;
        let statement = SelectBuilder::new(table)
            .columns(columns)
            .filter(filter.clone())
            .build()?;

        log::debug!("{} query: {}", self.engine.name(), statement);
        self.engine.query(&statement).await
    }

    /// Update the row whose `key_column` equals `key_value`
    ///
    /// Returns the number of rows changed, which is zero when the key matches
    /// nothing. Fails with `InvalidArgument` for an empty value set.
    pub async fn update_by_key(
        &self,
        table: &str,
        key_column: &str,
        key_value: impl Into<Value>,
        values: &ValueSet,
    ) -> Result<u64> {
        self.ensure_connected()?;
        let statement = UpdateBuilder::new(table)
            .values(values.clone())
            .key(key_column, key_value)
            .build()?;
        Ok(self.run(&statement).await?.rows_affected)
    }

    /// Delete the rows matching `filter`, returning how many were removed
    ///
    /// `Filter::All` removes every row; an empty `Filter::Matching` set fails
    /// with `InvalidArgument`.
    pub async fn delete(&self, table: &str, filter: &Filter) -> Result<u64> {
        self.ensure_connected()?;
        let statement = DeleteBuilder::new(table, filter.clone()).build()?;
        Ok(self.run(&statement).await?.rows_affected)
    }

    /// Delete every row of `table`
    pub async fn delete_all(&self, table: &str) -> Result<u64> {
        self.delete(table, &Filter::All).await
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.engine.is_connected() {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    async fn run(&self, statement: &Statement) -> Result<ExecOutcome> {
        log::debug!("{} execute: {}", self.engine.name(), statement);
        self.engine.execute(statement).await
    }
}

impl<E: Engine> Drop for TableAccessor<E> {
    fn drop(&mut self) {
        if self.engine.is_connected() {
            log::debug!("accessor dropped while connected; releasing store");
            self.engine.release();
        }
    }
}

/// Releases the session opened by a `with_session` call that never finished
struct SessionGuard<'a, E: Engine> {
    engine: &'a E,
    armed: bool,
}

impl<E: Engine> Drop for SessionGuard<'_, E> {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("{} session scope dropped before closing; releasing store", self.engine.name());
            self.engine.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::row::map_rows;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    /// Engine double that records statements instead of running them
    #[derive(Default)]
    struct RecordingEngine {
        connected: AtomicBool,
        closes: AtomicUsize,
        releases: AtomicUsize,
        fail_execute: AtomicBool,
        executed: Mutex<Vec<Statement>>,
    }

    #[async_trait]
    impl Engine for RecordingEngine {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn connect(&self, _config: &AccessorConfig) -> Result<()> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn disconnect(&self) -> Result<()> {
            if self.connected.swap(false, Ordering::SeqCst) {
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn release(&self) {
            if self.connected.swap(false, Ordering::SeqCst) {
                self.releases.fetch_add(1, Ordering::SeqCst);
            }
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn execute(&self, statement: &Statement) -> Result<ExecOutcome> {
            if self.fail_execute.load(Ordering::SeqCst) {
                return Err(StoreError::query("disk I/O error"));
            }
            self.executed.lock().push(statement.clone());
            Ok(ExecOutcome {
                rows_affected: 1,
                last_insert_id: 7,
            })
        }

        async fn query(&self, statement: &Statement) -> Result<MappedRows> {
            self.executed.lock().push(statement.clone());
            map_rows(vec!["id".to_string()], Vec::new())
        }
    }

    fn accessor() -> TableAccessor<RecordingEngine> {
        TableAccessor::with_engine(AccessorConfig::memory(), RecordingEngine::default())
    }

    #[tokio::test]
    async fn test_operations_require_open_session() {
        let accessor = accessor();
        let values = ValueSet::new().with("id", "s1");

        assert!(matches!(
            accessor.insert("items", &values).await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            accessor.select("items", &Filter::All).await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            accessor.update_by_key("items", "id", "s1", &values).await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            accessor.delete("items", &Filter::All).await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(accessor.ping().await, Err(StoreError::NotConnected)));
        assert!(accessor.engine().executed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let accessor = accessor();
        assert_ok!(accessor.close().await);

        assert_ok!(accessor.open().await);
        assert!(accessor.is_connected());
        assert_ok!(accessor.close().await);
        assert_ok!(accessor.close().await);
        assert!(!accessor.is_connected());
        assert_eq!(accessor.engine().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_insert_reports_row_id_and_binds_in_order() {
        let accessor = accessor();
        assert_ok!(accessor.open().await);

        let values = ValueSet::new().with("id", "s1").with("label", "Track");
        assert_eq!(assert_ok!(accessor.insert("items", &values).await), 7);

        let executed = accessor.engine().executed.lock();
        assert_eq!(executed[0].sql(), r#"INSERT INTO "items" ("id", "label") VALUES (?, ?)"#);
        assert_eq!(executed[0].params(), [Value::from("s1"), Value::from("Track")]);
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_engine() {
        let accessor = accessor();
        assert_ok!(accessor.open().await);

        let empty = ValueSet::new();
        assert!(matches!(
            accessor.insert("items", &empty).await,
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            accessor.update_by_key("items", "id", "s1", &empty).await,
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            accessor.delete("items", &Filter::Matching(empty)).await,
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(accessor.engine().executed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_engine_failure_is_not_empty_success() {
        let accessor = accessor();
        assert_ok!(accessor.open().await);
        accessor.engine().fail_execute.store(true, Ordering::SeqCst);

        let result = accessor
            .insert("items", &ValueSet::new().with("id", "s1"))
            .await;
        assert!(matches!(result, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_with_session_closes_after_failure() {
        let accessor = accessor();
        accessor.engine().fail_execute.store(true, Ordering::SeqCst);

        let result = accessor
            .with_session(|acc| {
                Box::pin(async move { acc.delete_all("items").await })
            })
            .await;

        assert_err!(result);
        assert!(!accessor.is_connected());
        assert_eq!(accessor.engine().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_session_returns_closure_value() {
        let accessor = accessor();

        let removed = accessor
            .with_session(|acc| {
                Box::pin(async move { acc.delete("items", &Filter::by("id", "s1")).await })
            })
            .await;

        assert_eq!(assert_ok!(removed), 1);
        assert!(!accessor.is_connected());
    }

    #[tokio::test]
    async fn test_with_session_keeps_caller_session_open() {
        let accessor = accessor();
        assert_ok!(accessor.open().await);

        let removed = accessor
            .with_session(|acc| Box::pin(async move { acc.delete_all("items").await }))
            .await;

        assert_eq!(assert_ok!(removed), 1);
        assert!(accessor.is_connected());
        assert_eq!(accessor.engine().closes.load(Ordering::SeqCst), 0);

        // Failures inside the closure leave it open too
        accessor.engine().fail_execute.store(true, Ordering::SeqCst);
        let result = accessor
            .with_session(|acc| Box::pin(async move { acc.delete_all("items").await }))
            .await;
        assert_err!(result);
        assert!(accessor.is_connected());
    }

    #[tokio::test]
    async fn test_cancelled_session_is_released() {
        let accessor = accessor();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            accessor.with_session(|_| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                })
            }),
        )
        .await;

        assert!(cancelled.is_err());
        assert!(!accessor.is_connected());
        assert_eq!(accessor.engine().releases.load(Ordering::SeqCst), 1);
        assert_eq!(accessor.engine().closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_caller_session_stays_open() {
        let accessor = accessor();
        assert_ok!(accessor.open().await);

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            accessor.with_session(|_| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                })
            }),
        )
        .await;

        assert!(cancelled.is_err());
        assert!(accessor.is_connected());
        assert_eq!(accessor.engine().releases.load(Ordering::SeqCst), 0);
    }
}
