//! The graph index and its incremental operations.

use chrono::{DateTime, Utc};
use flywheel_core::paths::{fold_path, normalize_rel_path, note_title};
use flywheel_core::{fold_entity_key, link_resolution_key, Note, Outlink, Result};
use flywheel_parser::parse_markdown;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// One inbound reference to an entity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backlink {
    pub source_path: String,
    pub line: u32,
}

/// A note's claim on an entity key, via its title or one of its aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityClaim {
    /// Display path of the claiming note.
    pub path: String,
    /// Case-preserving title or alias text.
    pub display: String,
    pub is_alias: bool,
}

/// A single outlink occurrence inverted under its folded target key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkRef {
    source_path: String,
    line: u32,
    raw_target: String,
}

/// Aggregate counts for the stats tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct GraphStats {
    pub note_count: usize,
    pub link_count: usize,
    pub entity_count: usize,
    pub tag_count: usize,
    pub dead_target_count: usize,
    pub parse_error_count: usize,
}

/// Read-model record for `get_note_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteMetadata {
    pub path: String,
    pub title: String,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
    pub front_matter: flywheel_core::FieldMap,
    pub modified: DateTime<Utc>,
    pub backlink_count: usize,
    pub outlink_count: usize,
    pub parse_error: bool,
}

/// The in-memory vault graph.
///
/// All four maps are derived from the flat notes collection; `upsert` and
/// `delete` maintain them so that the result of any operation sequence is
/// structurally equal to [`GraphIndex::rebuild`] on the same tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphIndex {
    /// Folded vault-relative path → note (original case kept on the note).
    notes: HashMap<String, Note>,
    /// Folded target key → inbound references, sorted by (source, line).
    links: HashMap<String, Vec<LinkRef>>,
    /// Folded entity key → claims, sorted so the winner is first.
    claims: HashMap<String, Vec<EntityClaim>>,
    /// Tag → display paths of notes carrying it.
    tags: HashMap<String, BTreeSet<String>>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the vault and build a fresh index.
    ///
    /// Files that fail to read are logged and indexed as flagged notes with
    /// empty structure so the index stays consistent.
    pub async fn rebuild(root: &Path) -> Result<Self> {
        let files = crate::walk::walk_vault(root).await?;
        let mut index = Self::new();
        let total = files.len();
        for rel in files {
            index.upsert(root, &rel).await?;
        }
        info!(
            notes = total,
            entities = index.claims.len(),
            "graph rebuild complete"
        );
        Ok(index)
    }

    /// Parse the file at `rel` and replace its entry.
    ///
    /// A path that no longer exists on disk is treated as a delete, which is
    /// what a racing unlink between batch and apply looks like.
    pub async fn upsert(&mut self, root: &Path, rel: &str) -> Result<()> {
        match read_note(root, rel).await? {
            Some((note, _body)) => self.apply_note(note),
            None => {
                debug!(path = %rel, "upsert target vanished, deleting");
                self.delete(rel);
            }
        }
        Ok(())
    }

    /// Insert or replace a fully-built note (pure, no I/O).
    pub fn apply_note(&mut self, note: Note) {
        let key = fold_path(&note.path);
        if let Some(old) = self.notes.remove(&key) {
            self.remove_contributions(&old);
        }
        self.add_contributions(&note);
        self.notes.insert(key, note);
    }

    /// Remove a note and every map contribution it made.
    pub fn delete(&mut self, rel: &str) -> bool {
        let key = fold_path(&normalize_rel_path(rel));
        match self.notes.remove(&key) {
            Some(old) => {
                self.remove_contributions(&old);
                true
            }
            None => false,
        }
    }

    fn add_contributions(&mut self, note: &Note) {
        for outlink in &note.outlinks {
            let target_key = link_resolution_key(&outlink.target);
            if target_key.is_empty() {
                continue;
            }
            let refs = self.links.entry(target_key).or_default();
            let link = LinkRef {
                source_path: note.path.clone(),
                line: outlink.line,
                raw_target: outlink.target.clone(),
            };
            let pos = refs.partition_point(|r| link_order(r) <= link_order(&link));
            refs.insert(pos, link);
        }

        for (claim_key, claim) in note_claims(note) {
            let claims = self.claims.entry(claim_key.clone()).or_default();
            let pos = claims.partition_point(|c| claim_order(c) <= claim_order(&claim));
            claims.insert(pos, claim);
            if claims.len() > 1 {
                warn!(
                    key = %claim_key,
                    winner = %claims[0].path,
                    contender = %claims[1].path,
                    "entity key contention"
                );
            }
        }

        for tag in &note.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(note.path.clone());
        }
    }

    fn remove_contributions(&mut self, note: &Note) {
        for outlink in &note.outlinks {
            let target_key = link_resolution_key(&outlink.target);
            if let Some(refs) = self.links.get_mut(&target_key) {
                if let Some(pos) = refs.iter().position(|r| {
                    r.source_path == note.path
                        && r.line == outlink.line
                        && r.raw_target == outlink.target
                }) {
                    refs.remove(pos);
                }
                if refs.is_empty() {
                    self.links.remove(&target_key);
                }
            }
        }

        for (claim_key, claim) in note_claims(note) {
            if let Some(claims) = self.claims.get_mut(&claim_key) {
                if let Some(pos) = claims.iter().position(|c| *c == claim) {
                    claims.remove(pos);
                }
                if claims.is_empty() {
                    self.claims.remove(&claim_key);
                }
            }
        }

        for tag in &note.tags {
            if let Some(paths) = self.tags.get_mut(tag) {
                paths.remove(&note.path);
                if paths.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
    }

    /// Winning claim for a folded entity key, if any.
    pub fn entity_owner(&self, key: &str) -> Option<&EntityClaim> {
        self.claims.get(key).and_then(|c| c.first())
    }

    /// Resolve a raw wikilink target to the owning note's display path.
    pub fn resolve_target(&self, raw_target: &str) -> Option<&str> {
        self.entity_owner(&link_resolution_key(raw_target))
            .map(|c| c.path.as_str())
    }

    pub fn note(&self, rel: &str) -> Option<&Note> {
        self.notes.get(&fold_path(rel))
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// All inbound references to the note at `rel`, title key first, then
    /// alias keys in the note's alias order.
    pub fn get_backlinks(&self, rel: &str) -> Vec<Backlink> {
        let Some(note) = self.note(rel) else {
            return Vec::new();
        };
        let mut keys = vec![fold_entity_key(&note.title)];
        keys.extend(note.aliases.iter().map(|a| fold_entity_key(a)));

        let mut out = Vec::new();
        for key in keys {
            let owned = self
                .entity_owner(&key)
                .is_some_and(|claim| claim.path == note.path);
            if !owned {
                continue;
            }
            if let Some(refs) = self.links.get(&key) {
                out.extend(refs.iter().map(|r| Backlink {
                    source_path: r.source_path.clone(),
                    line: r.line,
                }));
            }
        }
        out
    }

    pub fn get_forward_links(&self, rel: &str) -> Vec<Outlink> {
        self.note(rel)
            .map(|n| n.outlinks.clone())
            .unwrap_or_default()
    }

    /// Unresolved targets ranked by reference count (count ties break on
    /// the sample text).
    pub fn dead_targets(&self) -> Vec<(String, usize)> {
        let mut out: Vec<(String, usize)> = self
            .links
            .iter()
            .filter(|(key, _)| self.entity_owner(key.as_str()).is_none())
            .map(|(_, refs)| (refs[0].raw_target.clone(), refs.len()))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Every unresolved outlink occurrence, for the broken-links tool.
    pub fn broken_link_occurrences(&self) -> Vec<(String, String, u32)> {
        let mut out: Vec<(String, String, u32)> = self
            .links
            .iter()
            .filter(|(key, _)| self.entity_owner(key.as_str()).is_none())
            .flat_map(|(_, refs)| {
                refs.iter()
                    .map(|r| (r.source_path.clone(), r.raw_target.clone(), r.line))
            })
            .collect();
        out.sort();
        out
    }

    pub fn notes_by_tag(&self, tag: &str) -> Vec<String> {
        self.tags
            .get(tag)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn all_tags(&self) -> Vec<(String, usize)> {
        let mut out: Vec<(String, usize)> = self
            .tags
            .iter()
            .map(|(tag, paths)| (tag.clone(), paths.len()))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn recent_notes(&self, limit: usize) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.values().collect();
        notes.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
        notes.truncate(limit);
        notes
    }

    pub fn note_metadata(&self, rel: &str) -> Option<NoteMetadata> {
        let note = self.note(rel)?;
        Some(NoteMetadata {
            path: note.path.clone(),
            title: note.title.clone(),
            aliases: note.aliases.clone(),
            tags: note.tags.iter().cloned().collect(),
            front_matter: note.front_matter.clone(),
            modified: note.modified,
            backlink_count: self.get_backlinks(rel).len(),
            outlink_count: note.outlinks.len(),
            parse_error: note.parse_error,
        })
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            note_count: self.notes.len(),
            link_count: self.notes.values().map(|n| n.outlinks.len()).sum(),
            entity_count: self.claims.len(),
            tag_count: self.tags.len(),
            dead_target_count: self
                .links
                .keys()
                .filter(|key| self.entity_owner(key.as_str()).is_none())
                .count(),
            parse_error_count: self.notes.values().filter(|n| n.parse_error).count(),
        }
    }
}

/// Read and parse one note from disk.
///
/// Returns the built [`Note`] plus the parsed body text (for the full-text
/// mirror), or `None` when the file does not exist. Unreadable files come
/// back as flagged notes with empty structure so indexing never stalls on
/// one bad file.
pub async fn read_note(root: &Path, rel: &str) -> Result<Option<(Note, String)>> {
    let rel = normalize_rel_path(rel);
    let abs = root.join(&rel);

    let bytes = match tokio::fs::read(&abs).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            warn!(path = %rel, error = %err, "read failed, indexing flagged note");
            return Ok(Some((error_note(&rel), String::new())));
        }
    };
    let raw = String::from_utf8_lossy(&bytes);
    let parsed = parse_markdown(&raw);
    if parsed.parse_error {
        warn!(path = %rel, "front-matter did not parse, continuing without it");
    }

    let modified = tokio::fs::metadata(&abs)
        .await
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);

    let note = Note {
        path: rel.clone(),
        title: note_title(&rel),
        aliases: parsed.aliases(),
        front_matter: parsed.front_matter.clone(),
        tags: parsed.tags(),
        outlinks: parsed.outlinks(),
        modified,
        content_hash: parsed.content_hash.clone(),
        parse_error: parsed.parse_error,
    };
    Ok(Some((note, parsed.body)))
}

/// Claims a note makes on the entity map: its title, then each alias.
fn note_claims(note: &Note) -> Vec<(String, EntityClaim)> {
    let mut out = Vec::new();
    let title_key = fold_entity_key(&note.title);
    if !title_key.is_empty() {
        out.push((
            title_key,
            EntityClaim {
                path: note.path.clone(),
                display: note.title.clone(),
                is_alias: false,
            },
        ));
    }
    for alias in &note.aliases {
        let key = fold_entity_key(alias);
        if key.is_empty() {
            continue;
        }
        out.push((
            key,
            EntityClaim {
                path: note.path.clone(),
                display: alias.clone(),
                is_alias: true,
            },
        ));
    }
    out
}

/// Titles beat aliases; then the shorter path wins; ties are lexicographic.
fn claim_order(claim: &EntityClaim) -> (bool, usize, &str, &str) {
    (
        claim.is_alias,
        claim.path.len(),
        claim.path.as_str(),
        claim.display.as_str(),
    )
}

fn link_order(link: &LinkRef) -> (&str, u32, &str) {
    (link.source_path.as_str(), link.line, link.raw_target.as_str())
}

fn error_note(rel: &str) -> Note {
    Note {
        path: rel.to_string(),
        title: note_title(rel),
        aliases: Vec::new(),
        front_matter: flywheel_core::FieldMap::new(),
        tags: BTreeSet::new(),
        outlinks: Vec::new(),
        modified: DateTime::<Utc>::UNIX_EPOCH,
        content_hash: String::new(),
        parse_error: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flywheel_core::FieldMap;

    fn note(path: &str, aliases: &[&str], outlinks: &[(&str, u32)], tags: &[&str]) -> Note {
        Note {
            path: path.to_string(),
            title: note_title(path),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            front_matter: FieldMap::new(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            outlinks: outlinks
                .iter()
                .map(|(t, l)| Outlink {
                    target: t.to_string(),
                    line: *l,
                })
                .collect(),
            modified: DateTime::<Utc>::UNIX_EPOCH,
            content_hash: "h".into(),
            parse_error: false,
        }
    }

    #[test]
    fn backlinks_follow_entity_resolution() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("A.md", &[], &[("B", 3)], &[]));
        graph.apply_note(note("B.md", &[], &[], &[]));

        let backlinks = graph.get_backlinks("B.md");
        assert_eq!(backlinks.len(), 1);
        assert_eq!(backlinks[0].source_path, "A.md");
        assert_eq!(backlinks[0].line, 3);
        assert_eq!(graph.get_forward_links("A.md")[0].target, "B");
    }

    #[test]
    fn deleting_source_clears_backlinks() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("A.md", &[], &[("B", 1)], &[]));
        graph.apply_note(note("B.md", &[], &[], &[]));
        assert!(graph.delete("A.md"));
        assert!(graph.get_backlinks("B.md").is_empty());
    }

    #[test]
    fn shorter_path_wins_entity_contention() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("deeply/nested/Topic.md", &[], &[], &[]));
        graph.apply_note(note("Topic.md", &[], &[], &[]));
        assert_eq!(graph.entity_owner("topic").unwrap().path, "Topic.md");

        // Removing the winner promotes the loser.
        graph.delete("Topic.md");
        assert_eq!(
            graph.entity_owner("topic").unwrap().path,
            "deeply/nested/Topic.md"
        );
    }

    #[test]
    fn alias_never_overrides_title() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("Rust.md", &[], &[], &[]));
        graph.apply_note(note("a.md", &["Rust"], &[], &[]));
        assert_eq!(graph.entity_owner("rust").unwrap().path, "Rust.md");
        assert!(!graph.entity_owner("rust").unwrap().is_alias);
    }

    #[test]
    fn dead_targets_ranked_by_reference_count() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("a.md", &[], &[("Ghost", 1), ("Ghost", 2), ("Wisp", 3)], &[]));
        let dead = graph.dead_targets();
        assert_eq!(dead[0], ("Ghost".to_string(), 2));
        assert_eq!(dead[1], ("Wisp".to_string(), 1));
    }

    #[test]
    fn link_with_fragment_resolves_to_note() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("a.md", &[], &[("Target#Section", 1)], &[]));
        graph.apply_note(note("Target.md", &[], &[], &[]));
        assert_eq!(graph.resolve_target("Target#Section"), Some("Target.md"));
        assert_eq!(graph.get_backlinks("Target.md").len(), 1);
    }

    #[test]
    fn tag_map_prunes_empty_sets() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("a.md", &[], &[], &["project"]));
        assert_eq!(graph.notes_by_tag("project"), vec!["a.md".to_string()]);
        graph.delete("a.md");
        assert!(graph.notes_by_tag("project").is_empty());
        assert_eq!(graph.stats().tag_count, 0);
    }

    #[test]
    fn upserting_same_path_replaces_contributions() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("a.md", &[], &[("X", 1)], &["old"]));
        graph.apply_note(note("a.md", &[], &[("Y", 1)], &["new"]));
        assert!(graph.notes_by_tag("old").is_empty());
        assert_eq!(graph.notes_by_tag("new"), vec!["a.md".to_string()]);
        let dead = graph.dead_targets();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].0, "Y");
    }
}
