//! SQLite connection handle.
//!
//! The [`Database`] struct wraps a single `rusqlite::Connection` behind an
//! `Arc<Mutex<>>` and exposes async methods that use
//! `tokio::task::spawn_blocking` to avoid blocking the async runtime.
//! The connection slot is an `Option` so that [`Database::close`] can take
//! the connection out; every later call fails with [`StoreError::Closed`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Thread-safe handle to a SQLite database.
///
/// Clones share the same connection. All read/write operations go through
/// [`Database::execute`] which dispatches onto the blocking thread pool.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Database {
    /// Open (or create) a database at `path` and apply connection pragmas.
    ///
    /// This call blocks briefly (file I/O), so call it during startup before
    /// entering the main async loop, or wrap it in `spawn_blocking` yourself.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database, mostly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;

        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Close the connection.
    ///
    /// Statements run in autocommit mode, so everything written before this
    /// call is already durable. After `close`, every clone of this handle
    /// returns [`StoreError::Closed`].
    pub async fn close(self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut slot = lock(&conn)?;
            let conn = slot.take().ok_or(StoreError::Closed)?;
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
            info!("database closed");
            Ok(())
        })
        .await?
    }

    /// Whether [`Database::close`] has been called on any clone of this handle.
    pub fn is_closed(&self) -> bool {
        match self.conn.lock() {
            Ok(slot) => slot.is_none(),
            Err(_) => true,
        }
    }

    /// Execute an arbitrary closure against the connection on the blocking pool.
    ///
    /// This is the primary way to interact with the database from async code.
    /// The closure receives a `&Connection` and must return a `StoreResult<T>`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db.execute(|conn| {
    ///     let count = conn.query_row("SELECT count(*) FROM users", [], |row| row.get(0))?;
    ///     Ok(count)
    /// }).await?;
    /// ```
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let slot = lock(&conn)?;
            let conn = slot.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }

    /// Execute a mutable closure (for transactions, etc.) on the blocking pool.
    ///
    /// The closure receives a `&mut Connection` so you can call
    /// `conn.transaction()` and friends.
    pub async fn execute_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut slot = lock(&conn)?;
            let conn = slot.as_mut().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        debug!("applying SQLite pragmas");

        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Busy timeout so a second process waits on a locked file instead
        // of failing immediately.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        Ok(())
    }
}

fn lock(conn: &Mutex<Option<Connection>>) -> StoreResult<MutexGuard<'_, Option<Connection>>> {
    conn.lock()
        .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_works() {
        let db = Database::open_in_memory().unwrap();
        let version: String = db
            .execute(|conn| {
                let v: String =
                    conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
                Ok(v)
            })
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn pragmas_are_applied() {
        let db = Database::open_in_memory().unwrap();
        let timeout: i64 = db
            .execute(|conn| {
                let v: i64 = conn.query_row("PRAGMA busy_timeout", [], |row| row.get(0))?;
                Ok(v)
            })
            .await
            .unwrap();
        assert_eq!(timeout, 5_000);
    }

    #[tokio::test]
    async fn execute_after_close_fails() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();
        assert!(!other.is_closed());

        db.close().await.unwrap();
        assert!(other.is_closed());

        let result = other.execute(|_| Ok(())).await;
        assert!(matches!(result, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn close_twice_fails() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();
        db.close().await.unwrap();

        let result = other.close().await;
        assert!(matches!(result, Err(StoreError::Closed)));
    }
}
