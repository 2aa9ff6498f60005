//! Pooled SQLite access shared by the SQLite-backed stores.
//!
//! Each operation checks a connection out of the pool, runs on the blocking
//! thread pool, and returns the connection before the call resolves. No
//! connection is held across an await on model or tool I/O.

pub mod migrations;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::{AtlasError, Result};

/// A bounded pool of SQLite connections to one database.
///
/// After [`close`](Self::close) every operation fails with
/// [`AtlasError::ConnectionClosed`], which callers treat as a stale handle.
pub struct Database {
    /// `None` for an in-memory database, which owns a single connection.
    path: Option<PathBuf>,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl Database {
    /// Open (or create) a database file with up to `pool_size` connections.
    pub fn open(path: &Path, pool_size: usize) -> Result<Arc<Self>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = open_connection(path)?;
        migrations::run_migrations(&conn)?;
        info!(path = %path.display(), pool_size, "database opened");

        Ok(Arc::new(Self {
            path: Some(path.to_path_buf()),
            idle: Mutex::new(vec![conn]),
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            closed: AtomicBool::new(false),
        }))
    }

    /// Open a private in-memory database (for tests and ephemeral runs).
    pub fn in_memory() -> Result<Arc<Self>> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::run_migrations(&conn)?;

        Ok(Arc::new(Self {
            path: None,
            idle: Mutex::new(vec![conn]),
            permits: Arc::new(Semaphore::new(1)),
            closed: AtomicBool::new(false),
        }))
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| self.closed_error())?;
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let conn = self.checkout()?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&conn);
            (conn, result)
        })
        .await
        .map_err(|e| AtlasError::Storage(format!("database task failed: {e}")))?;

        self.checkin(conn)?;
        result
    }

    /// Close every idle connection. Later operations fail with
    /// [`AtlasError::ConnectionClosed`]. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();
        if let Ok(mut idle) = self.idle.lock() {
            idle.clear();
        }
        info!(database = %self.label(), "database closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn checkout(&self) -> Result<Connection> {
        let pooled = self
            .idle
            .lock()
            .map_err(|e| AtlasError::Storage(format!("database lock poisoned: {e}")))?
            .pop();
        match (pooled, &self.path) {
            (Some(conn), _) => Ok(conn),
            (None, Some(path)) => {
                debug!(path = %path.display(), "opening pooled connection");
                open_connection(path)
            }
            (None, None) => Err(AtlasError::Storage(
                "in-memory connection unavailable".to_string(),
            )),
        }
    }

    fn checkin(&self, conn: Connection) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.idle
            .lock()
            .map_err(|e| AtlasError::Storage(format!("database lock poisoned: {e}")))?
            .push(conn);
        Ok(())
    }

    fn closed_error(&self) -> AtlasError {
        AtlasError::ConnectionClosed(format!("database {} is closed", self.label()))
    }

    fn label(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.label())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| AtlasError::Storage(format!("failed to open database: {e}")))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(|e| AtlasError::Storage(format!("failed to set pragmas: {e}")))?;
    Ok(conn)
}

/// Timestamp encoding used by every table: RFC 3339 with microseconds, so
/// text order matches time order.
pub(crate) fn encode_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AtlasError::Storage(format!("invalid timestamp {raw:?}: {e}")))
}
