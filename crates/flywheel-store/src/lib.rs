//! Persistent store: full-text rows and the entity catalogue.
//!
//! One SQLite file under `<vault>/.flywheel/` mirrors the in-memory graph
//! and survives restarts. The connection is shared behind a mutex; the
//! engine's single-writer discipline means contention is read-mostly.

mod entities;
mod notes;
mod schema;

pub use entities::{EntityFilter, EntityRow};
pub use notes::{flatten_front_matter, FullTextRow, SearchHit, SearchQuery, SearchScope};

use flywheel_core::{Error, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Subdirectory of the vault that holds engine state.
pub const STORE_DIR: &str = ".flywheel";
const STORE_FILE: &str = "index.db";

/// Handle to the persistent store. Cheap to clone.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (and migrate) the store for a vault, creating
    /// `<vault>/.flywheel/` on first use.
    pub async fn open(vault_root: &Path) -> Result<Self> {
        let dir = vault_root.join(STORE_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let db_path = dir.join(STORE_FILE);
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Fatal(format!("open {}: {e}", db_path.display())))?;
        let store = Self::from_connection(conn)?;
        info!(path = %db_path.display(), "store opened");
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Fatal(format!("open in-memory store: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn).map_err(map_sql_err)
    }

    /// Close the store, flushing SQLite's WAL if any.
    pub async fn close(self) -> Result<()> {
        // Dropping the last Arc closes the connection; an explicit
        // checkpoint keeps shutdown deterministic.
        self.with_conn(|conn| conn.execute_batch("PRAGMA optimize;"))?;
        Ok(())
    }
}

pub(crate) fn map_sql_err(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound("no matching row".into()),
        other => Error::Fatal(format!("store: {other}")),
    }
}
