//! Atomic file writes.

use flywheel_core::{validate_path, Error, Result};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Write `bytes` to `<root>/<rel>` atomically.
///
/// The payload goes to a sibling temp file in the target directory, is
/// fsynced, then renamed over the target, so a crash or concurrent reader
/// sees either the old note or the new one. Parent directories are created
/// as needed. Paths that resolve outside the vault root are rejected
/// before anything touches the filesystem.
pub async fn atomic_write(root: &Path, rel: &str, bytes: &[u8]) -> Result<()> {
    if !validate_path(root, rel) {
        return Err(Error::Invalid(format!(
            "path escapes the vault root: {rel}"
        )));
    }
    let target = root.join(rel);
    let parent = target
        .parent()
        .ok_or_else(|| Error::Invalid(format!("path has no parent: {rel}")))?
        .to_path_buf();
    tokio::fs::create_dir_all(&parent).await?;

    let bytes = bytes.to_vec();
    let target_clone = target.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&parent)?;
        std::io::Write::write_all(&mut tmp, &bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target_clone)
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))??;

    debug!(path = %target.display(), "atomic write complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_and_creates_parents() {
        let temp = TempDir::new().unwrap();
        atomic_write(temp.path(), "deep/nested/note.md", b"hello")
            .await
            .unwrap();
        let content = std::fs::read_to_string(temp.path().join("deep/nested/note.md")).unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn overwrite_replaces_whole_file() {
        let temp = TempDir::new().unwrap();
        atomic_write(temp.path(), "a.md", b"a longer original body")
            .await
            .unwrap();
        atomic_write(temp.path(), "a.md", b"short").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(temp.path().join("a.md")).unwrap(),
            "short"
        );
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_io() {
        let temp = TempDir::new().unwrap();
        let err = atomic_write(temp.path(), "../escape.md", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
        assert!(!temp.path().parent().unwrap().join("escape.md").exists());
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let temp = TempDir::new().unwrap();
        atomic_write(temp.path(), "a.md", b"x").await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["a.md".to_string()]);
    }
}
