//! Versioned schema migrations.
//!
//! The current version lives in the `meta` table; opening a store with an
//! older version applies the missing steps in place, and a newer version
//! than this build understands is fatal rather than silently downgraded.

use flywheel_core::{Error, Result};
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 2;

/// Ordered migration steps; index 0 brings an empty database to version 1.
const MIGRATIONS: &[&str] = &[
    // v1: full-text rows + entity catalogue
    "
    CREATE TABLE notes (
        path TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        frontmatter TEXT NOT NULL,
        body TEXT NOT NULL,
        modified TEXT NOT NULL
    );
    CREATE VIRTUAL TABLE notes_fts USING fts5(
        path UNINDEXED,
        title,
        frontmatter,
        body,
        tokenize = 'unicode61'
    );
    CREATE TABLE entities (
        folded_name TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        owning_path TEXT NOT NULL,
        category TEXT NOT NULL,
        aliases TEXT NOT NULL DEFAULT '[]',
        relevance REAL NOT NULL DEFAULT 0
    );
    CREATE INDEX idx_entities_owner ON entities(owning_path);
    ",
    // v2: optional embedding payload on entities
    "
    ALTER TABLE entities ADD COLUMN embedding BLOB;
    ",
];

/// Bring the connection up to [`SCHEMA_VERSION`].
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
    )
    .map_err(crate::map_sql_err)?;

    let current: i64 = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .map(|v| v.parse().unwrap_or(0))
        .unwrap_or(0);

    if current > SCHEMA_VERSION {
        return Err(Error::Fatal(format!(
            "store schema version {current} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    for version in current..SCHEMA_VERSION {
        let step = MIGRATIONS[version as usize];
        conn.execute_batch(step).map_err(crate::map_sql_err)?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = ?1",
            [(version + 1).to_string()],
        )
        .map_err(crate::map_sql_err)?;
        info!(from = version, to = version + 1, "store schema migrated");
    }
    Ok(())
}
