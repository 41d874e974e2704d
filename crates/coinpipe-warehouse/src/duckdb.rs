//! `DuckDB` connection reuse.
//!
//! A run touches the database from one task at a time, so the manager keeps a
//! single idle connection and hands it out again on the next acquire.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ::duckdb::Connection;

struct ManagerInner {
    db_path: PathBuf,
    idle: Mutex<Option<Connection>>,
}

/// Opens and recycles connections to one database file.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<ManagerInner>,
}

impl DuckDbConnectionManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                db_path: path.into(),
                idle: Mutex::new(None),
            }),
        }
    }

    /// Take the idle connection, or open a new one when none is parked.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let parked = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let connection = match parked {
            Some(connection) => connection,
            None => open_connection(&self.inner.db_path)?,
        };

        Ok(PooledConnection {
            owner: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }
}

/// Connection handle that parks itself back in the manager on drop.
pub struct PooledConnection {
    owner: Arc<ManagerInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("connection is only taken on drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let mut idle = self
                .owner
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if idle.is_none() {
                *idle = Some(connection);
            }
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn released_connection_is_reused() {
        let temp = tempdir().expect("tempdir");
        let manager = DuckDbConnectionManager::new(temp.path().join("reuse.duckdb"));

        {
            let connection = manager.acquire().expect("acquire");
            connection
                .execute_batch("CREATE TEMP TABLE marker (id INTEGER)")
                .expect("create temp table");
        }

        // Temp tables are connection-scoped; reading it proves the same connection came back.
        let connection = manager.acquire().expect("acquire again");
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM marker", [], |row| row.get(0))
            .expect("temp table visible");
        assert_eq!(count, 1);
    }
}
