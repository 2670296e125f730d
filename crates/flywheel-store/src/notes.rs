//! Full-text rows and search.

use crate::SqliteStore;
use chrono::{DateTime, Utc};
use flywheel_core::{FieldMap, Result};
use rusqlite::params;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// One searchable row per note. `front_matter` is the flattened
/// `key: value` text, `body` excludes the front-matter fence lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullTextRow {
    pub path: String,
    pub title: String,
    pub front_matter: String,
    pub body: String,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    FullText,
    Metadata,
}

/// Search request; unset filters are ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchQuery {
    pub scope: SearchScope,
    pub query: Option<String>,
    pub title_contains: Option<String>,
    pub frontmatter_has: Option<String>,
    pub folder: Option<String>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn full_text(query: impl Into<String>) -> Self {
        Self {
            scope: SearchScope::FullText,
            query: Some(query.into()),
            limit: 50,
            ..Self::default()
        }
    }

    pub fn metadata() -> Self {
        Self {
            scope: SearchScope::Metadata,
            limit: 50,
            ..Self::default()
        }
    }

    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_title_contains(mut self, fragment: impl Into<String>) -> Self {
        self.title_contains = Some(fragment.into());
        self
    }

    pub fn with_frontmatter_has(mut self, fragment: impl Into<String>) -> Self {
        self.frontmatter_has = Some(fragment.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
}

impl SqliteStore {
    pub async fn upsert_note(&self, row: &FullTextRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM notes_fts WHERE path = ?1", params![row.path])?;
            conn.execute(
                "INSERT INTO notes (path, title, frontmatter, body, modified)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(path) DO UPDATE SET
                     title = ?2, frontmatter = ?3, body = ?4, modified = ?5",
                params![
                    row.path,
                    row.title,
                    row.front_matter,
                    row.body,
                    row.modified.to_rfc3339(),
                ],
            )?;
            conn.execute(
                "INSERT INTO notes_fts (path, title, frontmatter, body)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.path, row.title, row.front_matter, row.body],
            )?;
            Ok(())
        })
    }

    /// Remove a note's row; entity rows owned by the note cascade with it.
    pub async fn delete_note(&self, path: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM notes WHERE path = ?1", params![path])?;
            conn.execute("DELETE FROM notes_fts WHERE path = ?1", params![path])?;
            conn.execute(
                "DELETE FROM entities WHERE owning_path = ?1",
                params![path],
            )?;
            Ok(())
        })
    }

    pub async fn list_note_paths(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT path FROM notes ORDER BY path")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
    }

    pub async fn note_row_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
        })
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let limit = if query.limit == 0 { 50 } else { query.limit };
        match query.scope {
            SearchScope::FullText if query.query.as_deref().is_some_and(|q| !q.trim().is_empty()) => {
                self.search_full_text(query, limit)
            }
            _ => self.search_metadata(query, limit),
        }
    }

    fn search_full_text(&self, query: &SearchQuery, limit: usize) -> Result<Vec<SearchHit>> {
        let match_expr = fts_match_expression(query.query.as_deref().unwrap_or(""));
        let folder = folder_pattern(query.folder.as_deref());
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.path, n.title
                 FROM notes_fts f JOIN notes n ON n.path = f.path
                 WHERE notes_fts MATCH ?1
                   AND (?2 IS NULL OR n.path LIKE ?2)
                   AND (?3 IS NULL OR instr(lower(n.title), lower(?3)) > 0)
                 ORDER BY rank
                 LIMIT ?4",
            )?;
            let rows = stmt.query_map(
                params![match_expr, folder, query.title_contains, limit as i64],
                |row| {
                    Ok(SearchHit {
                        path: row.get(0)?,
                        title: row.get(1)?,
                    })
                },
            )?;
            rows.collect()
        })
    }

    fn search_metadata(&self, query: &SearchQuery, limit: usize) -> Result<Vec<SearchHit>> {
        let folder = folder_pattern(query.folder.as_deref());
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT path, title FROM notes
                 WHERE (?1 IS NULL OR instr(lower(title), lower(?1)) > 0)
                   AND (?2 IS NULL OR instr(lower(frontmatter), lower(?2)) > 0)
                   AND (?3 IS NULL OR path LIKE ?3)
                 ORDER BY modified DESC
                 LIMIT ?4",
            )?;
            let rows = stmt.query_map(
                params![
                    query.title_contains,
                    query.frontmatter_has,
                    folder,
                    limit as i64
                ],
                |row| {
                    Ok(SearchHit {
                        path: row.get(0)?,
                        title: row.get(1)?,
                    })
                },
            )?;
            rows.collect()
        })
    }

    /// Word-boundary occurrences of a folded entity name across titles and
    /// bodies. FTS narrows to candidate rows; exact counting happens on the
    /// folded text.
    pub async fn count_mentions(&self, folded_name: &str) -> Result<usize> {
        let name = folded_name.trim();
        if name.is_empty() {
            return Ok(0);
        }
        let phrase = format!("\"{}\"", name.replace('"', "\"\""));
        let candidates: Vec<(String, String)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.title, n.body
                 FROM notes_fts f JOIN notes n ON n.path = f.path
                 WHERE notes_fts MATCH ?1",
            )?;
            let rows = stmt.query_map(params![phrase], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect()
        })?;

        let mut total = 0;
        for (title, body) in candidates {
            total += count_word_occurrences(&fold_text(&title), name);
            total += count_word_occurrences(&fold_text(&body), name);
        }
        Ok(total)
    }
}

pub(crate) fn fold_text(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

/// Non-overlapping occurrences of `needle` in `haystack` where neither
/// neighbour is alphanumeric.
fn count_word_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut from = 0;
    while let Some(found) = haystack[from..].find(needle) {
        let start = from + found;
        let end = start + needle.len();
        let left_ok = haystack[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let right_ok = haystack[end..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        if left_ok && right_ok {
            count += 1;
        }
        from = end;
    }
    count
}

/// Each whitespace token becomes a quoted prefix term, so `proj not`
/// matches "Project Notes".
fn fts_match_expression(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| format!("\"{}\"*", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn folder_pattern(folder: Option<&str>) -> Option<String> {
    folder.map(|f| format!("{}/%", f.trim_end_matches('/')))
}

/// Flatten front-matter to `key: value` lines for the search index.
pub fn flatten_front_matter(map: &FieldMap) -> String {
    let mut out = String::new();
    for (key, value) in map.iter() {
        let rendered = match serde_json::to_value(value) {
            Ok(serde_json::Value::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(_) => String::new(),
        };
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&rendered);
        out.push('\n');
    }
    out
}
