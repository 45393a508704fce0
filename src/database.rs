use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};
use rusqlite::Connection;

use crate::error::SqlTideError;
use crate::targets::ConnectionSpec;

/// How long a run waits on another writer before giving up.
const LOCK_WAIT: Duration = Duration::from_secs(30);

/// One open catalog of the embedded engine.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Catalog-level create-if-absent. Runs exactly once per target, before
    /// any journal or script transaction, and is idempotent. Returns whether
    /// the catalog was created.
    pub fn create_if_absent(
        spec: &ConnectionSpec,
        storage_root: &std::path::Path,
    ) -> Result<bool, SqlTideError> {
        let path = spec.catalog_path(storage_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if path.exists() {
            debug!("catalog '{}' already exists at {}", spec.catalog(), path.display());
            return Ok(false);
        }

        // Opening creates the catalog file
        Connection::open(&path)?;
        info!("created catalog '{}' at {}", spec.catalog(), path.display());
        Ok(true)
    }

    pub fn connect(
        spec: &ConnectionSpec,
        storage_root: &std::path::Path,
    ) -> Result<Self, SqlTideError> {
        let path = spec.catalog_path(storage_root);
        debug!(
            "connecting to catalog '{}' on {} as '{}'",
            spec.catalog(),
            spec.address(),
            spec.username()
        );
        let conn = Connection::open(&path)?;
        conn.busy_timeout(LOCK_WAIT)?;
        Ok(Database { conn, path })
    }

    /// Advisory lock for the duration of the run. With exclusive locking
    /// mode, the first write grabs the file lock and the connection keeps it
    /// until it closes, so two concurrent runs against the same catalog
    /// serialize instead of interleaving journal writes.
    pub fn lock_exclusive(&self) -> Result<(), SqlTideError> {
        let _mode: String =
            self.conn
                .query_row("PRAGMA locking_mode = EXCLUSIVE", [], |row| row.get(0))?;
        self.conn.execute_batch("BEGIN EXCLUSIVE; COMMIT;")?;
        debug!("holding exclusive lock on {}", self.path.display());
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
