//! Tool surface: the operations external collaborators may call.
//!
//! Read tools return typed, serde-serialisable records from a stable graph
//! snapshot. Write tools mutate through the structural writer, optionally
//! commit through the version-control gateway, emit synthetic queue events
//! so the index converges, and report outcomes as values: a failed
//! mutation is a `MutationOutcome` with `success=false` and an actionable
//! message, never a panic.

mod read_ops;
mod write_ops;

pub use read_ops::{
    find_broken_links, find_hub_notes, find_orphan_notes, get_backlinks, get_folder_structure,
    get_forward_links, get_note_metadata, get_recent_notes, graph_analysis, search,
    suggest_wikilinks, validate_links, vault_stats, AnalysisMode, BrokenLink, FolderNode,
    GraphAnalysis, NoteSummary,
};
pub use write_ops::{
    rename_field, rename_tag, migrate_field_values, vault_add_frontmatter_field, vault_add_task,
    vault_add_to_section, vault_create_note, vault_delete_note, vault_remove_from_section,
    vault_replace_in_section, vault_toggle_task, vault_undo_last_mutation,
    vault_update_frontmatter, AddToSectionRequest, SectionFormat, SectionPosition,
};

use flywheel_core::EngineConfig;
use flywheel_events::EventQueue;
use flywheel_graph::{GraphIndex, SweepReport};
use flywheel_store::SqliteStore;
use flywheel_vcs::GitGateway;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Commit-message prefix for engine mutations.
pub const MUTATION_TAG: &str = "flywheel";

/// Everything a tool invocation needs, wired up by the engine.
#[derive(Clone)]
pub struct ToolContext {
    pub vault_root: PathBuf,
    pub graph: Arc<RwLock<GraphIndex>>,
    pub store: SqliteStore,
    pub gateway: Arc<GitGateway>,
    /// Synthetic events for paths this process mutated.
    pub queue: EventQueue,
    pub config: EngineConfig,
    /// Latest sweep report, refreshed by the engine's timer.
    pub sweep: Arc<RwLock<SweepReport>>,
}

/// Discriminated result record every write tool returns.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct MutationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    pub undo_available: bool,
}

impl MutationOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn ok(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            path: Some(path.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serialises_without_empty_optionals() {
        let outcome = MutationOutcome::ok("added", "a.md");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["path"], "a.md");
        assert!(json.get("commit_hash").is_none());
        assert!(json.get("preview").is_none());
    }

    #[test]
    fn failure_is_a_value_not_an_error() {
        let outcome = MutationOutcome::failure("section \"Log\" not found");
        assert!(!outcome.success);
        assert!(!outcome.undo_available);
        assert!(outcome.message.contains("Log"));
    }
}
