//! Read-accessor tests over a small vault on disk.

use flywheel_graph::GraphIndex;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

async fn build_vault() -> (TempDir, GraphIndex) {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        root,
        "projects/Engine.md",
        "---\ntags: [project, project/active]\n---\nUses [[Rust]] and [[Tokio]].\n",
    );
    write(root, "tech/Rust.md", "---\ntags: [tech]\n---\nSee [[Tokio]].\n");
    write(root, "tech/Tokio.md", "---\ntags: [tech]\n---\nAsync runtime.\n");
    write(root, "inbox/loose.md", "Nothing links here, and it links nowhere.\n");
    let graph = GraphIndex::rebuild(root).await.unwrap();
    (temp, graph)
}

#[tokio::test]
async fn tag_queries_and_counts() {
    let (_temp, graph) = build_vault().await;
    assert_eq!(
        graph.notes_by_tag("tech"),
        vec!["tech/Rust.md".to_string(), "tech/Tokio.md".to_string()]
    );
    let all = graph.all_tags();
    assert_eq!(all[0], ("tech".to_string(), 2));
    assert!(all.contains(&("project/active".to_string(), 1)));
}

#[tokio::test]
async fn recent_notes_orders_by_mtime_desc() {
    let (temp, mut graph) = build_vault().await;
    // Touch one note to bump its mtime past the others.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    write(temp.path(), "inbox/loose.md", "Edited.\n");
    graph.upsert(temp.path(), "inbox/loose.md").await.unwrap();

    let recent = graph.recent_notes(2);
    assert_eq!(recent[0].path, "inbox/loose.md");
    assert_eq!(recent.len(), 2);
}

#[tokio::test]
async fn note_metadata_aggregates_counts() {
    let (_temp, graph) = build_vault().await;
    let meta = graph.note_metadata("tech/Tokio.md").unwrap();
    assert_eq!(meta.title, "Tokio");
    assert_eq!(meta.backlink_count, 2);
    assert_eq!(meta.outlink_count, 0);
    assert!(!meta.parse_error);
    assert!(graph.note_metadata("missing.md").is_none());
}

#[tokio::test]
async fn stats_cover_the_whole_graph() {
    let (_temp, graph) = build_vault().await;
    let stats = graph.stats();
    assert_eq!(stats.note_count, 4);
    assert_eq!(stats.link_count, 3);
    assert_eq!(stats.dead_target_count, 0);
    assert_eq!(stats.parse_error_count, 0);
    assert!(stats.entity_count >= 4);
}

#[tokio::test]
async fn lookup_is_case_insensitive_on_path() {
    let (_temp, graph) = build_vault().await;
    // Folded path lookup serves case-insensitive platforms; the display
    // path keeps its original case.
    let note = graph.note("TECH/rust.md").unwrap();
    assert_eq!(note.path, "tech/Rust.md");
}
