//! Path filtering and vault-relative path handling.
//!
//! The watcher feeds every raw filesystem notification through
//! [`is_watched_path`]; everything else in the engine only ever sees paths
//! that survived this filter, already normalised to forward slashes.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path};
use std::sync::OnceLock;

/// Directory names the engine never descends into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".obsidian",
    ".trash",
    "node_modules",
    ".vscode",
    ".claude",
    ".flywheel",
];

/// Well-known OS and editor droppings, matched against the basename.
const SYSTEM_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

fn swap_patterns() -> &'static GlobSet {
    static PATTERNS: OnceLock<GlobSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let mut builder = GlobSetBuilder::new();
        // vim/emacs/office lock and swap files, plus vim's probe file "4913"
        for pattern in ["*.swp", "*.swx", "*.tmp", "*~", "~$*", ".#*", "4913"] {
            builder.add(Glob::new(pattern).expect("static glob pattern"));
        }
        builder.build().expect("static glob set")
    })
}

/// Decide whether the engine cares about a path.
///
/// Watched iff the extension is `.md` (case-insensitive), no segment is in
/// the ignore set or a dotfile, and the basename is not a known system or
/// editor lock/swap file. Accepts either separator.
pub fn is_watched_path(path: &str) -> bool {
    let normalized = normalize_rel_path(path);
    let mut segments = normalized.split('/').filter(|s| !s.is_empty()).peekable();

    let mut basename = "";
    while let Some(segment) = segments.next() {
        let is_last = segments.peek().is_none();
        if is_last {
            basename = segment;
            break;
        }
        if IGNORED_DIRS.contains(&segment) || segment.starts_with('.') {
            return false;
        }
    }

    if basename.is_empty() || basename.starts_with('.') {
        return false;
    }
    if SYSTEM_FILES.iter().any(|f| f.eq_ignore_ascii_case(basename)) {
        return false;
    }
    if swap_patterns().is_match(basename) {
        return false;
    }

    Path::new(basename)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Normalise separators to `/` and strip any leading `./`.
pub fn normalize_rel_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    unified
        .strip_prefix("./")
        .map(str::to_string)
        .unwrap_or(unified)
}

/// Lookup form of a vault-relative path.
///
/// Case-insensitive platforms fold to lowercase for comparison; the
/// original case is retained for display on the [`crate::Note`] itself.
pub fn fold_path(path: &str) -> String {
    normalize_rel_path(path).to_lowercase()
}

/// File stem of a vault-relative path, used as the note title.
pub fn note_title(path: &str) -> String {
    Path::new(&normalize_rel_path(path))
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Convert an absolute path under `root` to the normalised vault-relative form.
pub fn to_vault_relative(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    Some(normalize_rel_path(&rel.to_string_lossy()))
}

/// Traversal guard: true iff resolving `rel` against `root` stays in `root`.
///
/// Pure predicate over the path text; it never touches the filesystem, so
/// symlinked escape routes are the caller's concern (the engine only creates
/// files, never follows links out of the vault).
pub fn validate_path(root: &Path, rel: &str) -> bool {
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() || rel.starts_with('/') || rel.starts_with('\\') {
        return false;
    }

    let mut depth: i32 = 0;
    for component in Path::new(&normalize_rel_path(rel)).components() {
        match component {
            Component::Normal(seg) => {
                // A drive-letter or UNC prefix smuggled mid-path is invalid.
                if seg.to_string_lossy().contains(':') {
                    return false;
                }
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }

    // Root itself is not a valid note path.
    depth > 0 && root.components().count() > 0
}
