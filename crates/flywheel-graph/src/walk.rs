//! Vault directory walker.

use flywheel_core::paths::{is_watched_path, to_vault_relative, IGNORED_DIRS};
use flywheel_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Collect every watched file under `root` as normalised vault-relative
/// paths. Ignored and dot directories are pruned without descending.
pub async fn walk_vault(root: &Path) -> Result<Vec<String>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        walk_into(&root, &root, &mut files)?;
        files.sort();
        Ok(files)
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?
}

fn walk_into(root: &PathBuf, dir: &Path, files: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if IGNORED_DIRS.contains(&name.as_ref()) || name.starts_with('.') {
                continue;
            }
            walk_into(root, &entry.path(), files)?;
        } else if file_type.is_file() {
            if let Some(rel) = to_vault_relative(root, &entry.path()) {
                if is_watched_path(&rel) {
                    files.push(rel);
                }
            }
        }
    }
    Ok(())
}
