//! Read tools. Each takes a stable graph snapshot (a read guard) and never
//! blocks the writer beyond the guard's lifetime.

use crate::ToolContext;
use flywheel_autolink::AutolinkOutcome;
use flywheel_core::Result;
use flywheel_graph::{Backlink, GraphStats, HubReport, NoteMetadata, SweepReport};
use flywheel_store::{EntityFilter, SearchHit, SearchQuery};
use serde::Serialize;
use std::collections::BTreeMap;

/// Compact listing row shared by several read tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteSummary {
    pub path: String,
    pub title: String,
    pub modified: chrono::DateTime<chrono::Utc>,
    pub tags: Vec<String>,
}

pub async fn get_backlinks(ctx: &ToolContext, path: &str) -> Vec<Backlink> {
    ctx.graph.read().await.get_backlinks(path)
}

pub async fn get_forward_links(ctx: &ToolContext, path: &str) -> Vec<flywheel_core::Outlink> {
    ctx.graph.read().await.get_forward_links(path)
}

pub async fn get_note_metadata(ctx: &ToolContext, path: &str) -> Option<NoteMetadata> {
    ctx.graph.read().await.note_metadata(path)
}

pub async fn get_recent_notes(ctx: &ToolContext, limit: usize) -> Vec<NoteSummary> {
    let graph = ctx.graph.read().await;
    graph
        .recent_notes(limit)
        .into_iter()
        .map(|note| NoteSummary {
            path: note.path.clone(),
            title: note.title.clone(),
            modified: note.modified,
            tags: note.tags.iter().cloned().collect(),
        })
        .collect()
}

/// Full-text or metadata search against the persistent store.
pub async fn search(ctx: &ToolContext, query: &SearchQuery) -> Result<Vec<SearchHit>> {
    ctx.store.search(query).await
}

pub async fn find_hub_notes(ctx: &ToolContext, min_links: usize, limit: usize) -> Vec<HubReport> {
    let graph = ctx.graph.read().await;
    let mut hubs: Vec<HubReport> = graph
        .notes()
        .filter_map(|note| {
            let backlink_count = graph.get_backlinks(&note.path).len();
            let outlink_count = note.outlinks.len();
            (backlink_count + outlink_count >= min_links).then(|| HubReport {
                path: note.path.clone(),
                backlink_count,
                outlink_count,
            })
        })
        .collect();
    hubs.sort_by(|a, b| {
        (b.backlink_count + b.outlink_count)
            .cmp(&(a.backlink_count + a.outlink_count))
            .then_with(|| a.path.cmp(&b.path))
    });
    hubs.truncate(limit);
    hubs
}

pub async fn find_orphan_notes(ctx: &ToolContext, limit: usize) -> Vec<String> {
    let graph = ctx.graph.read().await;
    let mut orphans: Vec<String> = graph
        .notes()
        .filter(|note| note.outlinks.is_empty() && graph.get_backlinks(&note.path).is_empty())
        .map(|note| note.path.clone())
        .collect();
    orphans.sort();
    orphans.truncate(limit);
    orphans
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Hubs,
    Orphans,
    DeadLinks,
    Stats,
    Sweep,
}

/// Union record returned by `graph_analysis`; only the requested section
/// is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct GraphAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hubs: Option<Vec<HubReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphans: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_links: Option<Vec<(String, usize)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<GraphStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepReport>,
}

pub async fn graph_analysis(ctx: &ToolContext, mode: AnalysisMode) -> GraphAnalysis {
    match mode {
        AnalysisMode::Hubs => GraphAnalysis {
            hubs: Some(find_hub_notes(ctx, ctx.config.sweep.hub_min_links, ctx.config.sweep.top_limit).await),
            ..GraphAnalysis::default()
        },
        AnalysisMode::Orphans => GraphAnalysis {
            orphans: Some(find_orphan_notes(ctx, ctx.config.sweep.top_limit).await),
            ..GraphAnalysis::default()
        },
        AnalysisMode::DeadLinks => GraphAnalysis {
            dead_links: Some(ctx.graph.read().await.dead_targets()),
            ..GraphAnalysis::default()
        },
        AnalysisMode::Stats => GraphAnalysis {
            stats: Some(ctx.graph.read().await.stats()),
            ..GraphAnalysis::default()
        },
        AnalysisMode::Sweep => GraphAnalysis {
            sweep: Some(ctx.sweep.read().await.clone()),
            ..GraphAnalysis::default()
        },
    }
}

pub async fn vault_stats(ctx: &ToolContext) -> GraphStats {
    ctx.graph.read().await.stats()
}

/// Folder tree of the vault, built from indexed note paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct FolderNode {
    pub folders: BTreeMap<String, FolderNode>,
    pub notes: Vec<String>,
}

pub async fn get_folder_structure(ctx: &ToolContext) -> FolderNode {
    let graph = ctx.graph.read().await;
    let mut root = FolderNode::default();
    let mut paths: Vec<String> = graph.notes().map(|n| n.path.clone()).collect();
    paths.sort();

    for path in paths {
        let mut node = &mut root;
        let mut segments = path.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                node.notes.push(segment.to_string());
            } else {
                node = node.folders.entry(segment.to_string()).or_default();
            }
        }
    }
    root
}

/// One unresolved wikilink occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    pub source_path: String,
    pub target: String,
    pub line: u32,
}

pub async fn find_broken_links(ctx: &ToolContext) -> Vec<BrokenLink> {
    ctx.graph
        .read()
        .await
        .broken_link_occurrences()
        .into_iter()
        .map(|(source_path, target, line)| BrokenLink {
            source_path,
            target,
            line,
        })
        .collect()
}

/// Alias of [`find_broken_links`] kept for the documented tool name.
pub async fn validate_links(ctx: &ToolContext) -> Vec<BrokenLink> {
    find_broken_links(ctx).await
}

/// Run the auto-wikilink resolver over caller-supplied text.
pub async fn suggest_wikilinks(
    ctx: &ToolContext,
    text: &str,
    source_path: Option<&str>,
) -> Result<AutolinkOutcome> {
    let catalogue = ctx.store.list_entities(&EntityFilter::default()).await?;
    Ok(flywheel_autolink::resolve(
        text,
        source_path,
        &catalogue,
        &ctx.config.autolink,
    ))
}
