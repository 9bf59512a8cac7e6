//! Pooled connections for concurrent callers.
//!
//! # Invariants
//! - Every pooled connection is configured by `configure_connection`.
//! - Migrations finish before the pool is returned.
//! - File databases are migrated and switched to WAL through one plain
//!   connection before any pooled connection is opened.
//! - In-memory pools share one named shared-cache database. An anchor
//!   connection held by the pool keeps it alive while pooled connections
//!   come and go.

use super::open::{
    configure_connection, open_db_with_timeout, open_shared_memory, shared_memory_flags,
};
use super::{DbError, DbResult};
use crate::config::{DatabaseLocation, StoreConfig};
use log::{error, info};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

static MEMORY_DB_SEQ: AtomicU64 = AtomicU64::new(0);

pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Connection pool for one database.
#[derive(Clone)]
pub struct DbPool {
    pool: Pool<SqliteConnectionManager>,
    /// Keeps a shared-cache in-memory database alive; `None` for files.
    _anchor: Option<Arc<Mutex<Connection>>>,
}

impl DbPool {
    /// Checks out a connection, waiting up to the pool's connection timeout.
    pub fn get(&self) -> DbResult<PooledConn> {
        Ok(self.pool.get()?)
    }

    /// Checks out a connection, waiting at most `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> DbResult<PooledConn> {
        Ok(self.pool.get_timeout(timeout)?)
    }

    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }
}

/// Builds a migrated connection pool for the configured database.
pub fn open_pool(config: &StoreConfig) -> DbResult<DbPool> {
    let started_at = Instant::now();
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
    let max_size = config.max_connections;

    let (manager, anchor, wal, mode) = match &config.database {
        DatabaseLocation::Memory => {
            let uri = next_memory_uri();
            info!(
                "event=pool_open module=db status=start mode=memory max_connections={}",
                max_size
            );
            let anchor = open_shared_memory(&uri, busy_timeout)
                .map_err(|err| log_pool_error("memory", started_at, "db_bootstrap_failed", err))?;
            let manager = SqliteConnectionManager::file(&uri).with_flags(shared_memory_flags());
            (manager, Some(Arc::new(Mutex::new(anchor))), false, "memory")
        }
        DatabaseLocation::File(path) => {
            info!(
                "event=pool_open module=db status=start mode=file max_connections={}",
                max_size
            );
            let bootstrap = open_db_with_timeout(path, busy_timeout)
                .map_err(|err| log_pool_error("file", started_at, "db_bootstrap_failed", err))?;
            drop(bootstrap);
            (SqliteConnectionManager::file(path), None, true, "file")
        }
    };

    let manager = manager.with_init(move |conn| configure_connection(conn, wal, busy_timeout));
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|err| log_pool_error(mode, started_at, "pool_build_failed", err.into()))?;

    info!(
        "event=pool_open module=db status=ok mode={} duration_ms={}",
        mode,
        started_at.elapsed().as_millis()
    );
    Ok(DbPool {
        pool,
        _anchor: anchor,
    })
}

/// A database name unique within this process.
fn next_memory_uri() -> String {
    let seq = MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "file:agenda-mem-{}-{seq}?mode=memory&cache=shared",
        std::process::id()
    )
}

fn log_pool_error(mode: &str, started_at: Instant, error_code: &str, err: DbError) -> DbError {
    error!(
        "event=pool_open module=db status=error mode={} duration_ms={} error_code={} error={}",
        mode,
        started_at.elapsed().as_millis(),
        error_code,
        err
    );
    err
}
