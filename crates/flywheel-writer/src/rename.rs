//! Vault-wide tag and front-matter rewriters with mandatory dry-run.

use crate::note_file::NoteFile;
use flywheel_core::{FieldValue, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct TagRenameOptions {
    /// Restrict to notes under this folder.
    pub folder: Option<String>,
    /// Also rewrite `old/child` to `new/child`.
    pub rename_children: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FieldRenameOptions {
    pub folder: Option<String>,
    pub dry_run: bool,
}

/// Per-note before/after of the lines (or fields) that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangePreview {
    pub path: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RenameOutcome {
    pub affected_notes: usize,
    pub total_changes: usize,
    pub previews: Vec<ChangePreview>,
    /// Paths actually rewritten (empty in dry-run mode); callers feed these
    /// back through the event queue.
    pub changed_paths: Vec<String>,
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(^|[^\w#])#([A-Za-z_][A-Za-z0-9_-]*(?:/[A-Za-z0-9_-]+)*)")
            .expect("static regex")
    })
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`]*`").expect("static regex"))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s{0,3}(```|~~~)").expect("static regex"))
}

/// Rename a tag across the given notes, in front-matter arrays and inline
/// `#tag` occurrences outside code.
pub async fn rename_tag(
    root: &Path,
    note_paths: &[String],
    old: &str,
    new: &str,
    opts: &TagRenameOptions,
) -> Result<RenameOutcome> {
    let mut outcome = RenameOutcome::default();

    for rel in filter_folder(note_paths, opts.folder.as_deref()) {
        let mut note = NoteFile::read(root, rel).await?;
        let mut changes = 0;
        let mut before_lines = Vec::new();
        let mut after_lines = Vec::new();

        // Front-matter tag arrays (skipped when the YAML is broken).
        if !note.has_parse_error() {
            if let Some(tags_value) = note.front_matter().get("tags").cloned() {
                let old_tags = tags_value.as_string_list();
                let mut new_tags: Vec<String> = Vec::new();
                let mut fm_changed = false;
                for tag in &old_tags {
                    let renamed = rename_tag_value(tag, old, new, opts.rename_children);
                    if renamed.is_some() {
                        fm_changed = true;
                        changes += 1;
                    }
                    let value = renamed.unwrap_or_else(|| tag.clone());
                    // Collisions with an existing tag deduplicate.
                    if !new_tags.contains(&value) {
                        new_tags.push(value);
                    }
                }
                if fm_changed {
                    before_lines.push(format!("tags: [{}]", old_tags.join(", ")));
                    after_lines.push(format!("tags: [{}]", new_tags.join(", ")));
                    note.set_field(
                        "tags",
                        FieldValue::List(new_tags.into_iter().map(FieldValue::String).collect()),
                    )?;
                }
            }
        }

        // Inline occurrences, fence- and inline-code-aware.
        let (new_body, inline_changes, line_diffs) =
            rewrite_inline_tags(&note.body, old, new, opts.rename_children);
        if inline_changes > 0 {
            changes += inline_changes;
            for (before, after) in line_diffs {
                before_lines.push(before);
                after_lines.push(after);
            }
            note.body = new_body;
        }

        if changes == 0 {
            continue;
        }
        outcome.affected_notes += 1;
        outcome.total_changes += changes;
        outcome.previews.push(ChangePreview {
            path: rel.clone(),
            before: before_lines.join("\n"),
            after: after_lines.join("\n"),
        });
        if !opts.dry_run && note.write(root).await? {
            outcome.changed_paths.push(rel.clone());
        }
    }

    info!(
        old,
        new,
        notes = outcome.affected_notes,
        changes = outcome.total_changes,
        dry_run = opts.dry_run,
        "tag rename"
    );
    Ok(outcome)
}

/// Rename a front-matter key across notes, preserving value and position.
pub async fn rename_field(
    root: &Path,
    note_paths: &[String],
    old_key: &str,
    new_key: &str,
    opts: &FieldRenameOptions,
) -> Result<RenameOutcome> {
    let mut outcome = RenameOutcome::default();

    for rel in filter_folder(note_paths, opts.folder.as_deref()) {
        let mut note = NoteFile::read(root, rel).await?;
        if note.has_parse_error() || !note.front_matter().contains_key(old_key) {
            continue;
        }
        let rendered = render_field(note.front_matter().get(old_key));
        note.rename_field(old_key, new_key)?;

        outcome.affected_notes += 1;
        outcome.total_changes += 1;
        outcome.previews.push(ChangePreview {
            path: rel.clone(),
            before: format!("{old_key}: {rendered}"),
            after: format!("{new_key}: {rendered}"),
        });
        if !opts.dry_run && note.write(root).await? {
            outcome.changed_paths.push(rel.clone());
        }
    }

    debug!(old_key, new_key, notes = outcome.affected_notes, "field rename");
    Ok(outcome)
}

/// Rewrite enumerated front-matter values for one key.
pub async fn migrate_field_values(
    root: &Path,
    note_paths: &[String],
    key: &str,
    mapping: &HashMap<String, String>,
    opts: &FieldRenameOptions,
) -> Result<RenameOutcome> {
    let mut outcome = RenameOutcome::default();

    for rel in filter_folder(note_paths, opts.folder.as_deref()) {
        let mut note = NoteFile::read(root, rel).await?;
        if note.has_parse_error() {
            continue;
        }
        let Some(value) = note.front_matter().get(key).cloned() else {
            continue;
        };
        let (migrated, changes) = migrate_value(&value, mapping);
        if changes == 0 {
            continue;
        }
        outcome.affected_notes += 1;
        outcome.total_changes += changes;
        outcome.previews.push(ChangePreview {
            path: rel.clone(),
            before: format!("{key}: {}", render_field(Some(&value))),
            after: format!("{key}: {}", render_field(Some(&migrated))),
        });
        note.set_field(key, migrated)?;
        if !opts.dry_run && note.write(root).await? {
            outcome.changed_paths.push(rel.clone());
        }
    }

    debug!(key, notes = outcome.affected_notes, "field value migration");
    Ok(outcome)
}

fn filter_folder<'a>(paths: &'a [String], folder: Option<&'a str>) -> impl Iterator<Item = &'a String> {
    let prefix = folder.map(|f| format!("{}/", f.trim_end_matches('/')));
    paths
        .iter()
        .filter(move |p| prefix.as_deref().map(|pre| p.starts_with(pre)).unwrap_or(true))
}

fn rename_tag_value(tag: &str, old: &str, new: &str, children: bool) -> Option<String> {
    if tag == old {
        return Some(new.to_string());
    }
    if children {
        if let Some(rest) = tag.strip_prefix(old) {
            if let Some(child) = rest.strip_prefix('/') {
                return Some(format!("{new}/{child}"));
            }
        }
    }
    None
}

/// Rewrite `#old` occurrences outside fences and inline code.
///
/// Returns the new body, the change count, and per-line before/after pairs.
fn rewrite_inline_tags(
    body: &str,
    old: &str,
    new: &str,
    children: bool,
) -> (String, usize, Vec<(String, String)>) {
    let mut out_lines = Vec::new();
    let mut diffs = Vec::new();
    let mut changes = 0;
    let mut in_fence = false;

    for raw_line in body.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if fence_re().is_match(line) {
            in_fence = !in_fence;
            out_lines.push(raw_line.to_string());
            continue;
        }
        if in_fence || line.starts_with("    ") || line.starts_with('\t') {
            out_lines.push(raw_line.to_string());
            continue;
        }

        // Mask inline code so spans inside backticks never match; offsets
        // in the masked line equal offsets in the original.
        let masked = inline_code_re()
            .replace_all(line, |caps: &regex::Captures<'_>| " ".repeat(caps[0].len()))
            .into_owned();

        let mut replacements: Vec<(usize, usize, String)> = Vec::new();
        for caps in tag_re().captures_iter(&masked) {
            let name = caps.get(2).expect("tag capture");
            if let Some(renamed) = rename_tag_value(name.as_str(), old, new, children) {
                replacements.push((name.start(), name.end(), renamed));
            }
        }
        if replacements.is_empty() {
            out_lines.push(raw_line.to_string());
            continue;
        }

        let mut rewritten = line.to_string();
        for (start, end, renamed) in replacements.iter().rev() {
            rewritten.replace_range(*start..*end, renamed);
        }
        changes += replacements.len();
        diffs.push((line.to_string(), rewritten.clone()));
        if raw_line.ends_with('\r') {
            rewritten.push('\r');
        }
        out_lines.push(rewritten);
    }

    (out_lines.join("\n"), changes, diffs)
}

fn migrate_value(value: &FieldValue, mapping: &HashMap<String, String>) -> (FieldValue, usize) {
    match value {
        FieldValue::String(s) => match mapping.get(s) {
            Some(mapped) => (FieldValue::String(mapped.clone()), 1),
            None => (value.clone(), 0),
        },
        FieldValue::List(items) => {
            let mut changes = 0;
            let migrated = items
                .iter()
                .map(|item| {
                    let (v, c) = migrate_value(item, mapping);
                    changes += c;
                    v
                })
                .collect();
            (FieldValue::List(migrated), changes)
        }
        other => (other.clone(), 0),
    }
}

fn render_field(value: Option<&FieldValue>) -> String {
    value
        .and_then(|v| serde_json::to_string(v).ok())
        .unwrap_or_else(|| "null".to_string())
}
