//! Entity catalogue shared by the auto-linker and the graph.

use crate::SqliteStore;
use flywheel_core::{EntityCategory, Result};
use rusqlite::{params, Row};
use serde::Serialize;

/// One persistent entity row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRow {
    pub display_name: String,
    pub folded_name: String,
    pub owning_path: String,
    pub category: EntityCategory,
    pub aliases: Vec<String>,
    pub relevance_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<u8>>,
}

impl EntityRow {
    pub fn new(display_name: impl Into<String>, owning_path: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            folded_name: flywheel_core::fold_entity_key(&display_name),
            display_name,
            owning_path: owning_path.into(),
            category: EntityCategory::Other,
            aliases: Vec::new(),
            relevance_score: 0.0,
            embedding: None,
        }
    }

    pub fn with_category(mut self, category: EntityCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }
}

/// Filter for [`SqliteStore::list_entities`]; unset fields match everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityFilter {
    pub category: Option<EntityCategory>,
    pub name_contains: Option<String>,
    pub limit: Option<usize>,
}

fn row_to_entity(row: &Row<'_>) -> rusqlite::Result<EntityRow> {
    let aliases_json: String = row.get(4)?;
    Ok(EntityRow {
        folded_name: row.get(0)?,
        display_name: row.get(1)?,
        owning_path: row.get(2)?,
        category: EntityCategory::parse(&row.get::<_, String>(3)?),
        aliases: serde_json::from_str(&aliases_json).unwrap_or_default(),
        relevance_score: row.get(5)?,
        embedding: row.get(6)?,
    })
}

const ENTITY_COLUMNS: &str =
    "folded_name, display_name, owning_path, category, aliases, relevance, embedding";

impl SqliteStore {
    pub async fn upsert_entity(&self, row: &EntityRow) -> Result<()> {
        let aliases = serde_json::to_string(&row.aliases).unwrap_or_else(|_| "[]".into());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO entities
                     (folded_name, display_name, owning_path, category, aliases, relevance, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(folded_name) DO UPDATE SET
                     display_name = ?2, owning_path = ?3, category = ?4,
                     aliases = ?5, relevance = ?6, embedding = ?7",
                params![
                    row.folded_name,
                    row.display_name,
                    row.owning_path,
                    row.category.as_str(),
                    aliases,
                    row.relevance_score,
                    row.embedding,
                ],
            )?;
            Ok(())
        })
    }

    pub async fn get_entity(&self, folded_name: &str) -> Result<Option<EntityRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTITY_COLUMNS} FROM entities WHERE folded_name = ?1"
            ))?;
            let mut rows = stmt.query_map(params![folded_name], row_to_entity)?;
            rows.next().transpose()
        })
    }

    pub async fn delete_entity(&self, folded_name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM entities WHERE folded_name = ?1",
                params![folded_name],
            )?;
            Ok(changed > 0)
        })
    }

    /// Drop every entity owned by a note; used by the delete cascade.
    pub async fn delete_entities_for_path(&self, path: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM entities WHERE owning_path = ?1",
                params![path],
            )?;
            Ok(changed)
        })
    }

    pub async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<EntityRow>> {
        let limit = filter.limit.unwrap_or(10_000) as i64;
        let category = filter.category.map(|c| c.as_str().to_string());
        let name = filter.name_contains.clone();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTITY_COLUMNS} FROM entities
                 WHERE (?1 IS NULL OR category = ?1)
                   AND (?2 IS NULL OR instr(folded_name, lower(?2)) > 0)
                 ORDER BY relevance DESC, folded_name
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![category, name, limit], row_to_entity)?;
            rows.collect()
        })
    }

    /// Replace the whole catalogue with rows derived from the graph.
    ///
    /// Runs in one transaction so readers never observe a half-synced
    /// catalogue.
    pub async fn sync_entities(&self, rows: &[EntityRow]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch("BEGIN")?;
            let result = (|| {
                conn.execute("DELETE FROM entities", [])?;
                for row in rows {
                    let aliases = serde_json::to_string(&row.aliases).unwrap_or_else(|_| "[]".into());
                    conn.execute(
                        "INSERT INTO entities
                             (folded_name, display_name, owning_path, category, aliases, relevance, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                         ON CONFLICT(folded_name) DO NOTHING",
                        params![
                            row.folded_name,
                            row.display_name,
                            row.owning_path,
                            row.category.as_str(),
                            aliases,
                            row.relevance_score,
                            row.embedding,
                        ],
                    )?;
                }
                Ok(())
            })();
            match result {
                Ok(()) => conn.execute_batch("COMMIT")?,
                Err(err) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(err);
                }
            }
            Ok(())
        })
    }
}
