//! SQLite engine implementation
//!
//! This module provides a SQLite implementation of the Engine trait.

#[cfg(feature = "sqlite")]
use crate::core::{
    config::{AccessorConfig, Location},
    engine::{Engine, ExecOutcome},
    error::{Result, StoreError},
    query_builder::Statement,
    row::{map_rows, MappedRows},
    value::Value,
};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[cfg(feature = "sqlite")]
use rusqlite::{
    config::DbConfig,
    params_from_iter,
    types::{ToSqlOutput, ValueRef},
    Connection, InterruptHandle, ToSql,
};

/// The open session: its connection slot plus what a running call needs
///
/// The connection slot is shared with blocking tasks still running against
/// it; the connection closes when the last of them lets go.
#[cfg(feature = "sqlite")]
struct Session {
    location: Location,
    operation_timeout: Duration,
    interrupt: Arc<InterruptHandle>,
    connection: Arc<Mutex<Option<Connection>>>,
}

/// SQLite engine
///
/// Each call runs on tokio's blocking pool and is raced against the
/// configured operation timeout. On expiry the running statement is
/// interrupted and the call fails with `Timeout`.
#[cfg(feature = "sqlite")]
pub struct SqliteEngine {
    session: SyncMutex<Option<Session>>,
}

#[cfg(feature = "sqlite")]
impl SqliteEngine {
    /// Create a new, disconnected SQLite engine
    pub fn new() -> Self {
        Self {
            session: SyncMutex::new(None),
        }
    }

    /// Location of the open session, if any
    pub fn location(&self) -> Option<Location> {
        self.session.lock().as_ref().map(|s| s.location.clone())
    }

    fn open_connection(config: &AccessorConfig) -> Result<Connection> {
        let location = config.location.to_string();
        let cannot_open = |e: rusqlite::Error| {
            StoreError::connection_with_source(format!("cannot open {}: {}", location, e), Box::new(e))
        };

        let conn = match &config.location {
            Location::Memory => Connection::open_in_memory(),
            Location::File(path) => Connection::open(path),
        }
        .map_err(cannot_open)?;

        conn.busy_timeout(config.busy_timeout).map_err(cannot_open)?;
        // Quoted identifiers must never fall back to string literals
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DML, false)
            .map_err(cannot_open)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DDL, false)
            .map_err(cannot_open)?;
        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON")
                .map_err(cannot_open)?;
        }
        // Forces a read of the file header so a non-database file fails here
        conn.query_row("PRAGMA schema_version", [], |_| Ok(()))
            .map_err(cannot_open)?;

        Ok(conn)
    }

    /// Run `f` against the open connection on the blocking pool, bounded by the session timeout
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let (timeout, interrupt, connection_arc) = match self.session.lock().as_ref() {
            Some(session) => (
                session.operation_timeout,
                Arc::clone(&session.interrupt),
                Arc::clone(&session.connection),
            ),
            None => return Err(StoreError::NotConnected),
        };
        let timeout_ms = timeout.as_millis() as u64;

        let mut task = tokio::task::spawn_blocking(move || -> Result<T> {
            let connection = connection_arc.blocking_lock();
            let conn = connection.as_ref().ok_or(StoreError::NotConnected)?;
            f(conn)
        });

        // Use select! to interrupt and abort the task on timeout
        tokio::select! {
            result = &mut task => {
                match result.map_err(|e| StoreError::query(format!("Task join error: {}", e)))? {
                    Err(StoreError::Timeout { .. }) => Err(StoreError::timeout(timeout_ms)),
                    other => other,
                }
            }
            _ = tokio::time::sleep(timeout) => {
                interrupt.interrupt();
                task.abort();
                Err(StoreError::timeout(timeout_ms))
            }
        }
    }

    fn value_from_ref(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).to_string()),
            ValueRef::Blob(v) => Value::Blob(v.to_vec()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl Default for SqliteEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "sqlite")]
impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl Engine for SqliteEngine {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self, config: &AccessorConfig) -> Result<()> {
        // Clean up any existing session first
        self.disconnect().await?;

        let open_config = config.clone();
        let mut task = tokio::task::spawn_blocking(move || Self::open_connection(&open_config));

        // The connection is only installed by the winning branch; a late
        // open after a timeout is dropped with the task's output
        let conn = tokio::select! {
            result = &mut task => {
                result.map_err(|e| StoreError::connection(format!("Task join error: {}", e)))??
            }
            _ = tokio::time::sleep(config.operation_timeout) => {
                task.abort();
                return Err(StoreError::timeout(config.operation_timeout.as_millis() as u64));
            }
        };

        *self.session.lock() = Some(Session {
            location: config.location.clone(),
            operation_timeout: config.operation_timeout,
            interrupt: Arc::new(conn.get_interrupt_handle()),
            connection: Arc::new(Mutex::new(Some(conn))),
        });
        log::info!("opened sqlite store at {}", config.location);

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.lock().is_some()
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(session) = self.session.lock().take() else {
            return Ok(());
        };

        log::info!("closing sqlite store at {}", session.location);
        let conn = session.connection.lock().await.take();
        match conn {
            Some(conn) => conn.close().map_err(|(_, e)| StoreError::from(e)),
            None => Ok(()),
        }
    }

    fn release(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };

        log::info!("releasing sqlite store at {}", session.location);
        match session.connection.try_lock() {
            Ok(mut slot) => drop(slot.take()),
            // A statement is still running; it closes the connection when it returns
            Err(_) => session.interrupt.interrupt(),
        };
    }

    async fn ping(&self) -> Result<()> {
        self.run_blocking(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    async fn execute(&self, statement: &Statement) -> Result<ExecOutcome> {
        let (sql, params) = statement.clone().into_parts();

        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let affected = stmt.execute(params_from_iter(params.iter()))?;

            Ok(ExecOutcome {
                rows_affected: affected as u64,
                last_insert_id: conn.last_insert_rowid(),
            })
        })
        .await
    }

    async fn query(&self, statement: &Statement) -> Result<MappedRows> {
        let (sql, params) = statement.clone().into_parts();

        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let width = columns.len();

            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut raw = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(Self::value_from_ref(row.get_ref(i)?));
                }
                raw.push(values);
            }

            map_rows(columns, raw)
        })
        .await
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::core::query_builder::{InsertBuilder, SelectBuilder};

    async fn connected() -> SqliteEngine {
        let engine = SqliteEngine::new();
        engine
            .connect(&AccessorConfig::memory())
            .await
            .expect("Failed to connect");
        engine
    }

    #[tokio::test]
    async fn test_sqlite_connect_and_disconnect() {
        let engine = SqliteEngine::new();
        assert!(!engine.is_connected());
        assert!(engine.connect(&AccessorConfig::memory()).await.is_ok());
        assert!(engine.is_connected());
        assert_eq!(engine.location(), Some(Location::Memory));
        assert!(engine.ping().await.is_ok());

        assert!(engine.disconnect().await.is_ok());
        assert!(!engine.is_connected());
        // Second close is a no-op
        assert!(engine.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_sqlite_requires_connection() {
        let engine = SqliteEngine::new();
        let statement = SelectBuilder::new("items").build().unwrap();
        assert!(matches!(
            engine.query(&statement).await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(engine.ping().await, Err(StoreError::NotConnected)));
    }

    #[tokio::test]
    async fn test_sqlite_execute_and_query() -> Result<()> {
        let engine = connected().await;
        engine
            .execute(&Statement::new(
                "CREATE TABLE items (id TEXT PRIMARY KEY, label TEXT, nr INTEGER, score REAL, data BLOB)"
                    .to_string(),
                Vec::new(),
            ))
            .await?;

        let insert = InsertBuilder::new("items")
            .value("id", "s1")
            .value("label", "Track")
            .value("nr", 4)
            .value("score", 0.5)
            .value("data", vec![0u8, 255])
            .build()?;
        let outcome = engine.execute(&insert).await?;
        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.last_insert_id, 1);

        let rows = engine
            .query(&SelectBuilder::new("items").where_eq("id", "s1").build()?)
            .await?;
        assert_eq!(rows.len(), 1);
        let row = rows.first().expect("one row");
        assert_eq!(row.get("label"), Some(&Value::from("Track")));
        assert_eq!(row.get("nr"), Some(&Value::Integer(4)));
        assert_eq!(row.get("score"), Some(&Value::Real(0.5)));
        assert_eq!(row.get("data"), Some(&Value::Blob(vec![0, 255])));
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_null_round_trip() -> Result<()> {
        let engine = connected().await;
        engine
            .execute(&Statement::new(
                "CREATE TABLE t (id INTEGER, note TEXT)".to_string(),
                Vec::new(),
            ))
            .await?;
        engine
            .execute(
                &InsertBuilder::new("t")
                    .value("id", 1)
                    .value("note", Option::<String>::None)
                    .build()?,
            )
            .await?;

        let rows = engine.query(&SelectBuilder::new("t").build()?).await?;
        assert!(rows.first().expect("one row").get("note").expect("column").is_null());
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_unknown_table_is_an_error() {
        let engine = connected().await;
        let result = engine
            .query(&SelectBuilder::new("missing").build().unwrap())
            .await;
        assert!(matches!(result, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_sqlite_unreachable_location() {
        let engine = SqliteEngine::new();
        let config = AccessorConfig::file("/nonexistent-dir/for/sure/store.db");
        let result = engine.connect(&config).await;
        assert!(matches!(result, Err(StoreError::ConnectionError { .. })));
        assert!(!engine.is_connected());
    }

    #[tokio::test]
    async fn test_sqlite_timeout_interrupts_long_statement() {
        let engine = SqliteEngine::new();
        engine
            .connect(&AccessorConfig::memory().with_operation_timeout(Duration::from_millis(50)))
            .await
            .expect("Failed to connect");

        let endless = Statement::new(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT max(x) FROM n"
                .to_string(),
            Vec::new(),
        );
        let result = engine.query(&endless).await;
        assert!(matches!(result, Err(StoreError::Timeout { timeout_ms: 50 })));

        // The interrupted statement releases the connection for later calls
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_sqlite_quoted_unknown_column_is_an_error() -> Result<()> {
        let engine = connected().await;
        engine
            .execute(&Statement::new(
                "CREATE TABLE items (id TEXT)".to_string(),
                Vec::new(),
            ))
            .await?;

        // Never read back as the string literal 'label'
        let result = engine
            .query(&SelectBuilder::new("items").where_eq("label", "label").build()?)
            .await;
        assert!(matches!(result, Err(StoreError::Query(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_release_idle_session() {
        let engine = connected().await;
        engine.release();
        assert!(!engine.is_connected());
        assert!(matches!(engine.ping().await, Err(StoreError::NotConnected)));

        // Releasing twice is a no-op
        engine.release();
        assert!(engine.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_sqlite_release_interrupts_running_statement() {
        let engine = connected().await;
        let endless = Statement::new(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT max(x) FROM n"
                .to_string(),
            Vec::new(),
        );

        let cancelled = tokio::time::timeout(Duration::from_millis(50), engine.query(&endless)).await;
        assert!(cancelled.is_err());

        engine.release();
        assert!(!engine.is_connected());

        assert!(engine.connect(&AccessorConfig::memory()).await.is_ok());
        assert!(engine.ping().await.is_ok());
    }
}
