//! Round-trip fidelity and line-ending preservation for whole-note edits.

use flywheel_writer::{
    find_section, insert_in_section, InsertOptions, NoteFile, Position,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[tokio::test]
async fn read_write_without_edits_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let raw = "---\ntype: daily\ntags: [log, daily]\n---\n# Day\n\n## Log\n- one\n- two\n\n| a | b |\n|---|---|\n";
    std::fs::write(temp.path().join("n.md"), raw).unwrap();

    let note = NoteFile::read(temp.path(), "n.md").await.unwrap();
    assert_eq!(note.render(), raw);
    // Unchanged content never touches the disk.
    assert!(!note.write(temp.path()).await.unwrap());
}

#[tokio::test]
async fn crlf_file_stays_crlf_after_section_edit() {
    let temp = TempDir::new().unwrap();
    let raw = "---\r\ntype: t\r\n---\r\n# H\r\n\r\n## Log\r\n- a\r\n";
    std::fs::write(temp.path().join("n.md"), raw).unwrap();

    let mut note = NoteFile::read(temp.path(), "n.md").await.unwrap();
    let section = find_section(&note.body, "Log").unwrap();
    note.body = insert_in_section(
        &note.body,
        &section,
        "- b",
        Position::Append,
        &InsertOptions::default(),
    );
    assert!(note.write(temp.path()).await.unwrap());

    let written = std::fs::read_to_string(temp.path().join("n.md")).unwrap();
    assert!(written.contains("- a\r\n"));
    assert!(written.contains("- b\r\n"));
    // CRLF exclusively: no bare LF anywhere.
    assert!(!written.replace("\r\n", "").contains('\n'));
}

#[tokio::test]
async fn lf_file_stays_lf() {
    let temp = TempDir::new().unwrap();
    let raw = "# H\n\n## Log\n- a\n";
    std::fs::write(temp.path().join("n.md"), raw).unwrap();

    let mut note = NoteFile::read(temp.path(), "n.md").await.unwrap();
    let section = find_section(&note.body, "Log").unwrap();
    note.body = insert_in_section(
        &note.body,
        &section,
        "- b",
        Position::Append,
        &InsertOptions::default(),
    );
    note.write(temp.path()).await.unwrap();

    let written = std::fs::read_to_string(temp.path().join("n.md")).unwrap();
    assert_eq!(written, "# H\n\n## Log\n- a\n- b\n");
    assert!(!written.contains('\r'));
}

#[tokio::test]
async fn fences_and_nested_lists_survive_verbatim() {
    let temp = TempDir::new().unwrap();
    let raw = "## Code\n```rust\nfn main() { let x = [[1]]; }\n```\n\n## Log\n- a\n\t- tabbed child\n        - deep spaces\n";
    std::fs::write(temp.path().join("n.md"), raw).unwrap();

    let mut note = NoteFile::read(temp.path(), "n.md").await.unwrap();
    let section = find_section(&note.body, "Log").unwrap();
    note.body = insert_in_section(
        &note.body,
        &section,
        "- b",
        Position::Append,
        &InsertOptions::default(),
    );
    note.write(temp.path()).await.unwrap();

    let written = std::fs::read_to_string(temp.path().join("n.md")).unwrap();
    assert!(written.contains("fn main() { let x = [[1]]; }"));
    assert!(written.contains("\t- tabbed child"));
    assert!(written.contains("        - deep spaces\n- b\n"));
}

#[tokio::test]
async fn missing_note_is_not_found() {
    let temp = TempDir::new().unwrap();
    let err = NoteFile::read(temp.path(), "absent.md").await.unwrap_err();
    assert!(matches!(err, flywheel_core::Error::NotFound(_)));
}
