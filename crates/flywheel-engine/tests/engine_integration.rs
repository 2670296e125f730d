//! End-to-end tests: engine lifecycle, tool surface, and convergence of
//! mutations back through the event queue.

use flywheel_core::EngineConfig;
use flywheel_engine::Engine;
use flywheel_store::SearchQuery;
use flywheel_tools as tools;
use flywheel_writer::TagRenameOptions;
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

fn batch_config() -> EngineConfig {
    EngineConfig::new().with_watch_enabled(false)
}

fn seed_vault(root: &Path) {
    write(
        root,
        "people/Ada.md",
        "---\naliases: [Countess]\ncategory: person\n---\nWorks on [[Engine]].\n",
    );
    write(
        root,
        "projects/Engine.md",
        "---\ntags: [project]\n---\n# Engine\n\n## Log\n- started\n\nBuilt by [[Ada]].\n",
    );
    write(root, "daily/2025-01-01.md", "Met Ada about the Engine. #daily\n");
}

#[tokio::test]
async fn initial_build_populates_graph_and_store() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let ctx = engine.context();

    let backlinks = tools::get_backlinks(ctx, "projects/Engine.md").await;
    assert_eq!(backlinks.len(), 1);
    assert_eq!(backlinks[0].source_path, "people/Ada.md");

    // Aliases land in the flattened front-matter column, so they are
    // searchable too.
    let hits = tools::search(ctx, &SearchQuery::full_text("Countess"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "people/Ada.md");

    let hits = tools::search(ctx, &SearchQuery::full_text("started"))
        .await
        .unwrap();
    assert_eq!(hits[0].path, "projects/Engine.md");

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn mutation_converges_through_synthetic_events() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let ctx = engine.context();

    let request = tools::AddToSectionRequest {
        path: "projects/Engine.md".to_string(),
        section: "Log".to_string(),
        content: "linked [[Ada]] again".to_string(),
        format: tools::SectionFormat::Bullet,
        position: tools::SectionPosition::Append,
        preserve_list_nesting: false,
        commit: false,
    };
    let outcome = tools::vault_add_to_section(ctx, &request).await;
    assert!(outcome.success, "{}", outcome.message);

    engine.settle().await;

    // The new outlink is indexed.
    let backlinks = tools::get_backlinks(ctx, "people/Ada.md").await;
    assert_eq!(backlinks.len(), 2);

    // And the full-text row reflects the edit.
    let hits = tools::search(ctx, &SearchQuery::full_text("again"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_section_failure_lists_alternatives() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let request = tools::AddToSectionRequest {
        path: "projects/Engine.md".to_string(),
        section: "Changelog".to_string(),
        content: "x".to_string(),
        format: tools::SectionFormat::Plain,
        position: tools::SectionPosition::Append,
        preserve_list_nesting: false,
        commit: false,
    };
    let outcome = tools::vault_add_to_section(engine.context(), &request).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("Changelog"));
    assert!(outcome.message.contains("Log"), "message: {}", outcome.message);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn create_and_delete_note_update_index() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let ctx = engine.context();

    let outcome = tools::vault_create_note(
        ctx,
        "ideas/Spark.md",
        "A [[Ada]] idea.\n",
        Some(&serde_json::json!({"tags": ["idea"]})),
        false,
    )
    .await;
    assert!(outcome.success, "{}", outcome.message);
    engine.settle().await;

    assert!(tools::get_note_metadata(ctx, "ideas/Spark.md").await.is_some());
    assert_eq!(tools::get_backlinks(ctx, "people/Ada.md").await.len(), 2);

    let outcome = tools::vault_delete_note(ctx, "ideas/Spark.md", false).await;
    assert!(outcome.success);
    engine.settle().await;

    assert!(tools::get_note_metadata(ctx, "ideas/Spark.md").await.is_none());
    assert_eq!(tools::get_backlinks(ctx, "people/Ada.md").await.len(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let outcome =
        tools::vault_create_note(engine.context(), "people/Ada.md", "overwrite?", None, false)
            .await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("already exists"));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn frontmatter_tools_update_and_guard() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let ctx = engine.context();

    let outcome = tools::vault_add_frontmatter_field(
        ctx,
        "daily/2025-01-01.md",
        "mood",
        &serde_json::json!("good"),
        false,
    )
    .await;
    assert!(outcome.success, "{}", outcome.message);

    // Adding the same field twice is an error; updating is the right tool.
    let outcome = tools::vault_add_frontmatter_field(
        ctx,
        "daily/2025-01-01.md",
        "mood",
        &serde_json::json!("great"),
        false,
    )
    .await;
    assert!(!outcome.success);

    let outcome = tools::vault_update_frontmatter(
        ctx,
        "daily/2025-01-01.md",
        &serde_json::json!({"mood": "great", "energy": 7}),
        false,
    )
    .await;
    assert!(outcome.success);
    engine.settle().await;

    let meta = tools::get_note_metadata(ctx, "daily/2025-01-01.md")
        .await
        .unwrap();
    assert_eq!(
        meta.front_matter.get("mood").and_then(|v| v.as_str()),
        Some("great")
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn tag_rename_tool_reindexes_touched_notes() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let ctx = engine.context();

    let outcome = tools::rename_tag(
        ctx,
        "daily",
        "journal",
        &TagRenameOptions::default(),
    )
    .await;
    assert!(outcome.success, "{}", outcome.message);
    engine.settle().await;

    let meta = tools::get_note_metadata(ctx, "daily/2025-01-01.md")
        .await
        .unwrap();
    assert!(meta.tags.contains(&"journal".to_string()));
    assert!(!meta.tags.contains(&"daily".to_string()));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn suggest_wikilinks_uses_the_catalogue() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let outcome = tools::suggest_wikilinks(
        engine.context(),
        "Talked to Ada and the Countess about things.",
        Some("daily/2025-01-02.md"),
    )
    .await
    .unwrap();

    assert!(outcome.linked_entities.contains(&"Ada".to_string()));
    assert!(outcome.modified_text.contains("[[Ada]]"));
    // Second surface form of the same entity is left alone.
    assert!(outcome.modified_text.contains("the Countess"));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn sweep_reports_dead_links_and_orphans() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());
    write(temp.path(), "island.md", "No links here.\n");
    write(temp.path(), "broken.md", "See [[Nowhere]].\n");

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let report = engine.run_sweep_now().await.unwrap();

    assert!(report.dead_link_count >= 1);
    assert!(report.dead_links.iter().any(|d| d.target == "Nowhere"));
    assert!(report.orphans.contains(&"island.md".to_string()));

    let analysis =
        tools::graph_analysis(engine.context(), tools::AnalysisMode::Sweep).await;
    assert!(analysis.sweep.unwrap().dead_links.iter().any(|d| d.target == "Nowhere"));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn folder_structure_reflects_tree() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let tree = tools::get_folder_structure(engine.context()).await;
    assert!(tree.folders.contains_key("people"));
    assert!(tree.folders["people"].notes.contains(&"Ada.md".to_string()));
    assert!(tree.folders.contains_key("daily"));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn watcher_mode_picks_up_external_edits() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    let mut config = EngineConfig::new();
    config.queue.debounce_ms = 50;
    config.queue.flush_ms = 200;
    let engine = Engine::start(temp.path(), config).await.unwrap();
    let ctx = engine.context();

    // External editor writes a new note referencing Ada.
    write(temp.path(), "inbox/External.md", "From outside: [[Ada]].\n");
    tokio::time::sleep(std::time::Duration::from_millis(800)).await;
    engine.settle().await;

    let backlinks = tools::get_backlinks(ctx, "people/Ada.md").await;
    assert_eq!(backlinks.len(), 2, "external edit should be indexed");

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn restart_preserves_store_and_reindexes() {
    let temp = TempDir::new().unwrap();
    seed_vault(temp.path());

    {
        let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
        engine.shutdown().await.unwrap();
    }

    // Delete a file while the engine is down; restart must drop its rows.
    fs::remove_file(temp.path().join("daily/2025-01-01.md")).unwrap();
    let engine = Engine::start(temp.path(), batch_config()).await.unwrap();
    let hits = tools::search(engine.context(), &SearchQuery::full_text("Met"))
        .await
        .unwrap();
    assert!(hits.is_empty());

    engine.shutdown().await.unwrap();
}
