//! Write tools. Every mutation goes through the structural writer, then
//! optionally the commit gateway, then back through the event queue.

use crate::{MutationOutcome, ToolContext, MUTATION_TAG};
use flywheel_core::{Error, FieldValue};
use flywheel_events::{RawEvent, RawEventKind};
use flywheel_writer::{
    find_section, format_payload, insert_in_section, remove_from_section, replace_in_section,
    section_names, toggle_task, InsertOptions, NoteFile, PayloadStyle, Position,
    TagRenameOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SectionFormat {
    #[default]
    Plain,
    Bullet,
    Task,
    TimestampBullet,
}

impl SectionFormat {
    fn style(self) -> PayloadStyle {
        match self {
            Self::Plain => PayloadStyle::Plain,
            Self::Bullet => PayloadStyle::Bullet,
            Self::Task => PayloadStyle::Task,
            Self::TimestampBullet => {
                PayloadStyle::TimestampBullet(chrono::Local::now().time())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SectionPosition {
    #[default]
    Append,
    Prepend,
}

impl SectionPosition {
    fn position(self) -> Position {
        match self {
            Self::Append => Position::Append,
            Self::Prepend => Position::Prepend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddToSectionRequest {
    pub path: String,
    pub section: String,
    pub content: String,
    #[serde(default)]
    pub format: SectionFormat,
    #[serde(default)]
    pub position: SectionPosition,
    #[serde(default)]
    pub preserve_list_nesting: bool,
    #[serde(default)]
    pub commit: bool,
}

fn read_failure(err: Error, path: &str) -> MutationOutcome {
    MutationOutcome::failure(format!("cannot edit {path}: {err}"))
}

fn missing_section(section: &str, path: &str, body: &str) -> MutationOutcome {
    let available = section_names(body);
    let listing = if available.is_empty() {
        "the note has no headings".to_string()
    } else {
        format!("available sections: {}", available.join(", "))
    };
    MutationOutcome::failure(format!(
        "section \"{section}\" not found in {path}; {listing}"
    ))
}

/// Write the note back, emit a synthetic event, and optionally commit.
async fn finish_mutation(
    ctx: &ToolContext,
    note: &NoteFile,
    message: String,
    commit: bool,
) -> MutationOutcome {
    let rel = note.rel_path.clone();
    let wrote = match note.write(&ctx.vault_root).await {
        Ok(wrote) => wrote,
        Err(err) => return MutationOutcome::failure(format!("write failed for {rel}: {err}")),
    };
    if wrote {
        ctx.queue.push(RawEvent::new(rel.clone(), RawEventKind::Change));
    }

    let mut outcome = MutationOutcome::ok(message, rel.clone());
    if commit && wrote {
        let result = ctx.gateway.commit(&ctx.vault_root, &rel, MUTATION_TAG).await;
        if result.success {
            outcome.commit_hash = result.hash;
            outcome.undo_available = result.undo_available;
        } else {
            // The mutation is already on disk; report the commit failure
            // without rolling anything back.
            outcome.message = format!(
                "{}; file saved; commit failed: {}",
                outcome.message,
                result.error.unwrap_or_else(|| "unknown git error".into())
            );
            outcome.undo_available = false;
        }
    }
    info!(path = %rel, success = outcome.success, "mutation applied");
    outcome
}

pub async fn vault_add_to_section(ctx: &ToolContext, req: &AddToSectionRequest) -> MutationOutcome {
    let mut note = match NoteFile::read(&ctx.vault_root, &req.path).await {
        Ok(note) => note,
        Err(err) => return read_failure(err, &req.path),
    };
    let Some(section) = find_section(&note.body, &req.section) else {
        return missing_section(&req.section, &req.path, &note.body);
    };

    let payload = format_payload(&req.content, req.format.style());
    note.body = insert_in_section(
        &note.body,
        &section,
        &payload,
        req.position.position(),
        &InsertOptions {
            preserve_list_nesting: req.preserve_list_nesting,
        },
    );
    finish_mutation(
        ctx,
        &note,
        format!("added content to \"{}\" in {}", req.section, req.path),
        req.commit,
    )
    .await
}

pub async fn vault_remove_from_section(
    ctx: &ToolContext,
    path: &str,
    section_name: &str,
    needle: &str,
    commit: bool,
) -> MutationOutcome {
    let mut note = match NoteFile::read(&ctx.vault_root, path).await {
        Ok(note) => note,
        Err(err) => return read_failure(err, path),
    };
    let Some(section) = find_section(&note.body, section_name) else {
        return missing_section(section_name, path, &note.body);
    };
    let (new_body, removed) = remove_from_section(&note.body, &section, needle);
    if removed == 0 {
        return MutationOutcome::failure(format!(
            "no lines containing \"{needle}\" in section \"{section_name}\" of {path}"
        ));
    }
    note.body = new_body;
    finish_mutation(
        ctx,
        &note,
        format!("removed {removed} line(s) from \"{section_name}\" in {path}"),
        commit,
    )
    .await
}

pub async fn vault_replace_in_section(
    ctx: &ToolContext,
    path: &str,
    section_name: &str,
    from: &str,
    to: &str,
    commit: bool,
) -> MutationOutcome {
    let mut note = match NoteFile::read(&ctx.vault_root, path).await {
        Ok(note) => note,
        Err(err) => return read_failure(err, path),
    };
    let Some(section) = find_section(&note.body, section_name) else {
        return missing_section(section_name, path, &note.body);
    };
    let (new_body, replaced) = replace_in_section(&note.body, &section, from, to);
    if replaced == 0 {
        return MutationOutcome::failure(format!(
            "nothing matching \"{from}\" in section \"{section_name}\" of {path}"
        ));
    }
    note.body = new_body;
    finish_mutation(
        ctx,
        &note,
        format!("replaced {replaced} occurrence(s) in \"{section_name}\" of {path}"),
        commit,
    )
    .await
}

pub async fn vault_add_task(
    ctx: &ToolContext,
    path: &str,
    section_name: Option<&str>,
    text: &str,
    commit: bool,
) -> MutationOutcome {
    let request = AddToSectionRequest {
        path: path.to_string(),
        section: section_name.unwrap_or("Tasks").to_string(),
        content: text.to_string(),
        format: SectionFormat::Task,
        position: SectionPosition::Append,
        preserve_list_nesting: false,
        commit,
    };
    vault_add_to_section(ctx, &request).await
}

pub async fn vault_toggle_task(
    ctx: &ToolContext,
    path: &str,
    task_text: &str,
    commit: bool,
) -> MutationOutcome {
    let mut note = match NoteFile::read(&ctx.vault_root, path).await {
        Ok(note) => note,
        Err(err) => return read_failure(err, path),
    };
    let Some((new_body, now_checked)) = toggle_task(&note.body, task_text) else {
        return MutationOutcome::failure(format!(
            "no task containing \"{task_text}\" found in {path}"
        ));
    };
    note.body = new_body;
    let state = if now_checked { "done" } else { "open" };
    finish_mutation(
        ctx,
        &note,
        format!("task \"{task_text}\" marked {state} in {path}"),
        commit,
    )
    .await
}

pub async fn vault_update_frontmatter(
    ctx: &ToolContext,
    path: &str,
    updates: &serde_json::Value,
    commit: bool,
) -> MutationOutcome {
    let Some(object) = updates.as_object() else {
        return MutationOutcome::failure("front-matter updates must be a JSON object");
    };
    let mut note = match NoteFile::read(&ctx.vault_root, path).await {
        Ok(note) => note,
        Err(err) => return read_failure(err, path),
    };
    for (key, value) in object {
        if let Err(err) = note.set_field(key, FieldValue::from_json(value)) {
            return MutationOutcome::failure(format!("cannot update {path}: {err}"));
        }
    }
    finish_mutation(
        ctx,
        &note,
        format!("updated {} front-matter field(s) in {path}", object.len()),
        commit,
    )
    .await
}

pub async fn vault_add_frontmatter_field(
    ctx: &ToolContext,
    path: &str,
    key: &str,
    value: &serde_json::Value,
    commit: bool,
) -> MutationOutcome {
    let mut note = match NoteFile::read(&ctx.vault_root, path).await {
        Ok(note) => note,
        Err(err) => return read_failure(err, path),
    };
    if note.front_matter().contains_key(key) {
        return MutationOutcome::failure(format!(
            "field \"{key}\" already exists in {path}; use vault_update_frontmatter to change it"
        ));
    }
    if let Err(err) = note.set_field(key, FieldValue::from_json(value)) {
        return MutationOutcome::failure(format!("cannot update {path}: {err}"));
    }
    finish_mutation(
        ctx,
        &note,
        format!("added front-matter field \"{key}\" to {path}"),
        commit,
    )
    .await
}

pub async fn vault_create_note(
    ctx: &ToolContext,
    path: &str,
    content: &str,
    front_matter: Option<&serde_json::Value>,
    commit: bool,
) -> MutationOutcome {
    if !flywheel_core::validate_path(&ctx.vault_root, path) {
        return MutationOutcome::failure(format!("invalid path: {path}"));
    }
    if ctx.vault_root.join(path).exists() {
        return MutationOutcome::failure(format!(
            "note already exists: {path}; edit it instead of re-creating"
        ));
    }

    let mut note = NoteFile::new_empty(path);
    note.body = content.to_string();
    if let Some(fm) = front_matter.and_then(|v| v.as_object()) {
        for (key, value) in fm {
            if let Err(err) = note.set_field(key, FieldValue::from_json(value)) {
                return MutationOutcome::failure(format!("cannot create {path}: {err}"));
            }
        }
    }

    match note.write(&ctx.vault_root).await {
        Ok(_) => {}
        Err(err) => return MutationOutcome::failure(format!("create failed for {path}: {err}")),
    }
    ctx.queue.push(RawEvent::new(path, RawEventKind::Add));

    let mut outcome = MutationOutcome::ok(format!("created {path}"), path);
    if commit {
        let result = ctx.gateway.commit(&ctx.vault_root, path, MUTATION_TAG).await;
        if result.success {
            outcome.commit_hash = result.hash;
            outcome.undo_available = result.undo_available;
        } else {
            outcome.message = format!(
                "created {path}; file saved; commit failed: {}",
                result.error.unwrap_or_else(|| "unknown git error".into())
            );
        }
    }
    outcome
}

pub async fn vault_delete_note(ctx: &ToolContext, path: &str, commit: bool) -> MutationOutcome {
    if !flywheel_core::validate_path(&ctx.vault_root, path) {
        return MutationOutcome::failure(format!("invalid path: {path}"));
    }
    let abs = ctx.vault_root.join(path);
    if !abs.exists() {
        return MutationOutcome::failure(format!("note not found: {path}"));
    }
    if let Err(err) = tokio::fs::remove_file(&abs).await {
        return MutationOutcome::failure(format!("delete failed for {path}: {err}"));
    }
    ctx.queue.push(RawEvent::new(path, RawEventKind::Unlink));

    let mut outcome = MutationOutcome::ok(format!("deleted {path}"), path);
    if commit {
        let result = ctx.gateway.commit(&ctx.vault_root, path, MUTATION_TAG).await;
        if result.success {
            outcome.commit_hash = result.hash;
            outcome.undo_available = result.undo_available;
        } else {
            outcome.message = format!(
                "deleted {path}; commit failed: {}",
                result.error.unwrap_or_else(|| "unknown git error".into())
            );
        }
    }
    outcome
}

/// Revert the last engine commit, verified against the recorded hash, and
/// re-index the affected path.
pub async fn vault_undo_last_mutation(ctx: &ToolContext) -> MutationOutcome {
    let path = ctx.gateway.recorded_path(MUTATION_TAG);
    let result = ctx.gateway.undo_last(&ctx.vault_root, MUTATION_TAG).await;
    if !result.success {
        return MutationOutcome::failure(
            result
                .error
                .unwrap_or_else(|| "undo failed for an unknown reason".into()),
        );
    }
    if let Some(path) = &path {
        ctx.queue.push(RawEvent::new(path.clone(), RawEventKind::Change));
    }
    MutationOutcome {
        success: true,
        message: "reverted last mutation".to_string(),
        path,
        preview: None,
        commit_hash: result.hash,
        undo_available: false,
    }
}

async fn indexed_paths(ctx: &ToolContext) -> Vec<String> {
    let graph = ctx.graph.read().await;
    let mut paths: Vec<String> = graph.notes().map(|n| n.path.clone()).collect();
    paths.sort();
    paths
}

fn rename_outcome(
    ctx: &ToolContext,
    result: flywheel_writer::RenameOutcome,
    message: String,
) -> MutationOutcome {
    for path in &result.changed_paths {
        ctx.queue.push(RawEvent::new(path.clone(), RawEventKind::Change));
    }
    MutationOutcome {
        success: true,
        message,
        path: None,
        preview: serde_json::to_value(&result).ok(),
        commit_hash: None,
        undo_available: false,
    }
}

pub async fn rename_tag(
    ctx: &ToolContext,
    old: &str,
    new: &str,
    opts: &TagRenameOptions,
) -> MutationOutcome {
    let paths = indexed_paths(ctx).await;
    match flywheel_writer::rename_tag(&ctx.vault_root, &paths, old, new, opts).await {
        Ok(result) => {
            let message = format!(
                "renamed tag #{old} to #{new} in {} note(s) ({} change(s)){}",
                result.affected_notes,
                result.total_changes,
                if opts.dry_run { " [dry run]" } else { "" }
            );
            rename_outcome(ctx, result, message)
        }
        Err(err) => MutationOutcome::failure(format!("tag rename failed: {err}")),
    }
}

pub async fn rename_field(
    ctx: &ToolContext,
    old_key: &str,
    new_key: &str,
    opts: &flywheel_writer::FieldRenameOptions,
) -> MutationOutcome {
    let paths = indexed_paths(ctx).await;
    match flywheel_writer::rename_field(&ctx.vault_root, &paths, old_key, new_key, opts).await {
        Ok(result) => {
            let message = format!(
                "renamed field \"{old_key}\" to \"{new_key}\" in {} note(s){}",
                result.affected_notes,
                if opts.dry_run { " [dry run]" } else { "" }
            );
            rename_outcome(ctx, result, message)
        }
        Err(err) => MutationOutcome::failure(format!("field rename failed: {err}")),
    }
}

pub async fn migrate_field_values(
    ctx: &ToolContext,
    key: &str,
    mapping: &HashMap<String, String>,
    opts: &flywheel_writer::FieldRenameOptions,
) -> MutationOutcome {
    let paths = indexed_paths(ctx).await;
    match flywheel_writer::migrate_field_values(&ctx.vault_root, &paths, key, mapping, opts).await {
        Ok(result) => {
            let message = format!(
                "migrated \"{key}\" values in {} note(s) ({} change(s)){}",
                result.affected_notes,
                result.total_changes,
                if opts.dry_run { " [dry run]" } else { "" }
            );
            rename_outcome(ctx, result, message)
        }
        Err(err) => MutationOutcome::failure(format!("field value migration failed: {err}")),
    }
}
