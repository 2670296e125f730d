//! One note held open for structural editing.

use crate::atomic::atomic_write;
use flywheel_core::{validate_path, Error, FieldMap, FieldValue, LineEnding, Result};
use flywheel_parser::{detect_line_ending, split_frontmatter};
use std::path::Path;
use tracing::debug;

/// A note read from disk, split into front-matter and an LF-normalised
/// body, remembering everything needed to write it back faithfully.
#[derive(Debug, Clone)]
pub struct NoteFile {
    pub rel_path: String,
    /// Note body with line endings normalised to LF for editing.
    pub body: String,
    front_matter: FieldMap,
    /// Verbatim front-matter YAML as read; reused on write until a field
    /// is modified so untouched front-matter never gets reformatted.
    raw_front_matter: Option<String>,
    fm_dirty: bool,
    fm_parse_error: bool,
    pub line_ending: LineEnding,
    /// Exact bytes read, for the unchanged-write short-circuit.
    original_text: String,
}

impl NoteFile {
    pub async fn read(root: &Path, rel: &str) -> Result<Self> {
        if !validate_path(root, rel) {
            return Err(Error::Invalid(format!(
                "path escapes the vault root: {rel}"
            )));
        }
        let abs = root.join(rel);
        let bytes = tokio::fs::read(&abs).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("note not found: {rel}"))
            } else {
                Error::Io(err)
            }
        })?;
        let raw = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Self::from_text(rel, &raw))
    }

    /// Build a note from raw text (used for new notes and tests).
    pub fn from_text(rel: &str, raw: &str) -> Self {
        let line_ending = detect_line_ending(raw);
        let split = split_frontmatter(raw);
        Self {
            rel_path: rel.to_string(),
            body: split.body.replace("\r\n", "\n"),
            front_matter: split.fields,
            raw_front_matter: split.raw.map(|y| y.replace("\r\n", "\n")),
            fm_dirty: false,
            fm_parse_error: split.parse_error,
            line_ending,
            original_text: raw.to_string(),
        }
    }

    /// Start an empty note (no front-matter, LF line ending).
    pub fn new_empty(rel: &str) -> Self {
        Self {
            rel_path: rel.to_string(),
            body: String::new(),
            front_matter: FieldMap::new(),
            raw_front_matter: None,
            fm_dirty: false,
            fm_parse_error: false,
            line_ending: LineEnding::Lf,
            original_text: String::new(),
        }
    }

    pub fn front_matter(&self) -> &FieldMap {
        &self.front_matter
    }

    pub fn has_parse_error(&self) -> bool {
        self.fm_parse_error
    }

    fn fm_writable(&self) -> Result<()> {
        if self.fm_parse_error {
            return Err(Error::parse(
                self.rel_path.clone(),
                "front-matter is malformed; fix it manually before editing fields",
            ));
        }
        Ok(())
    }

    pub fn set_field(&mut self, key: &str, value: FieldValue) -> Result<()> {
        self.fm_writable()?;
        self.front_matter.insert(key.to_string(), value);
        self.fm_dirty = true;
        Ok(())
    }

    pub fn remove_field(&mut self, key: &str) -> Result<Option<FieldValue>> {
        self.fm_writable()?;
        let removed = self.front_matter.remove(key);
        if removed.is_some() {
            self.fm_dirty = true;
        }
        Ok(removed)
    }

    /// Rename a key, keeping its value and position.
    pub fn rename_field(&mut self, old: &str, new: &str) -> Result<bool> {
        self.fm_writable()?;
        let renamed = self.front_matter.rename_key(old, new);
        if renamed {
            self.fm_dirty = true;
        }
        Ok(renamed)
    }

    /// Mutable access for multi-field edits; marks front-matter dirty.
    pub fn front_matter_mut(&mut self) -> Result<&mut FieldMap> {
        self.fm_writable()?;
        self.fm_dirty = true;
        Ok(&mut self.front_matter)
    }

    /// Render the full on-disk form: front-matter block, body, detected
    /// line ending throughout, exactly one trailing newline.
    pub fn render(&self) -> String {
        let fm_block = if self.fm_dirty {
            if self.front_matter.is_empty() {
                None
            } else {
                Some(serialize_field_map(&self.front_matter))
            }
        } else {
            self.raw_front_matter.clone()
        };

        let mut out = String::new();
        if let Some(yaml) = fm_block {
            out.push_str("---\n");
            out.push_str(&yaml);
            if !yaml.is_empty() && !yaml.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("---\n");
        }
        out.push_str(&self.body);

        while out.ends_with('\n') {
            out.pop();
        }
        out.push('\n');

        match self.line_ending {
            LineEnding::Lf => out,
            LineEnding::Crlf => out.replace('\n', "\r\n"),
        }
    }

    /// Write atomically; returns false when the rendered note is identical
    /// to what was read, in which case nothing touches the disk.
    pub async fn write(&self, root: &Path) -> Result<bool> {
        let rendered = self.render();
        if rendered == self.original_text {
            debug!(path = %self.rel_path, "content unchanged, skipping write");
            return Ok(false);
        }
        atomic_write(root, &self.rel_path, rendered.as_bytes()).await?;
        Ok(true)
    }
}

fn serialize_field_map(map: &FieldMap) -> String {
    let value = FieldValue::Map(map.clone()).to_yaml();
    serde_yaml::to_string(&value).unwrap_or_default()
}
