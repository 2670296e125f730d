//! Periodic graph-hygiene metrics.
//!
//! Sweep only reads: it folds the graph and the full-text mention counts
//! into a cached report. It never mutates either side.

use crate::GraphIndex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flywheel_core::{fold_entity_key, Result, SweepConfig};
use serde::Serialize;

/// Source of full-text mention counts, implemented by the persistent store.
#[async_trait]
pub trait MentionCounts: Send + Sync {
    async fn count_mentions(&self, folded_name: &str) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLinkReport {
    pub target: String,
    pub reference_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnlinkedMention {
    pub name: String,
    pub path: String,
    pub unlinked_mentions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubReport {
    pub path: String,
    pub backlink_count: usize,
    pub outlink_count: usize,
}

/// The cached result of one sweep pass.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SweepReport {
    pub dead_link_count: usize,
    /// Unresolved targets ranked by reference count.
    pub dead_links: Vec<DeadLinkReport>,
    /// Entities whose full-text mentions outnumber their backlinks.
    pub top_unlinked: Vec<UnlinkedMention>,
    pub hubs: Vec<HubReport>,
    pub orphans: Vec<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// Compute graph-quality metrics from the current graph snapshot.
pub async fn run_sweep(
    graph: &GraphIndex,
    mentions: &dyn MentionCounts,
    config: &SweepConfig,
) -> Result<SweepReport> {
    let dead = graph.dead_targets();
    let dead_link_count = dead.iter().map(|(_, count)| count).sum();
    let dead_links = dead
        .into_iter()
        .take(config.top_limit)
        .map(|(target, reference_count)| DeadLinkReport {
            target,
            reference_count,
        })
        .collect();

    let mut top_unlinked = Vec::new();
    for note in graph.notes() {
        let folded = fold_entity_key(&note.title);
        if folded.is_empty() {
            continue;
        }
        // Only the entity owner accumulates mentions; losers of a key
        // contention would double-count.
        if graph
            .entity_owner(&folded)
            .map(|claim| claim.path != note.path)
            .unwrap_or(true)
        {
            continue;
        }
        let mentions_count = mentions.count_mentions(&folded).await?;
        let backlinks = graph.get_backlinks(&note.path).len();
        // One mention is the note naming itself.
        let unlinked = mentions_count.saturating_sub(backlinks).saturating_sub(1);
        if unlinked > 0 {
            top_unlinked.push(UnlinkedMention {
                name: note.title.clone(),
                path: note.path.clone(),
                unlinked_mentions: unlinked,
            });
        }
    }
    top_unlinked.sort_by(|a, b| {
        b.unlinked_mentions
            .cmp(&a.unlinked_mentions)
            .then_with(|| a.path.cmp(&b.path))
    });
    top_unlinked.truncate(config.top_limit);

    let mut hubs = Vec::new();
    let mut orphans = Vec::new();
    for note in graph.notes() {
        let backlink_count = graph.get_backlinks(&note.path).len();
        let outlink_count = note.outlinks.len();
        if backlink_count + outlink_count >= config.hub_min_links {
            hubs.push(HubReport {
                path: note.path.clone(),
                backlink_count,
                outlink_count,
            });
        }
        if config.include_orphans && backlink_count == 0 && outlink_count == 0 {
            orphans.push(note.path.clone());
        }
    }
    hubs.sort_by(|a, b| {
        (b.backlink_count + b.outlink_count)
            .cmp(&(a.backlink_count + a.outlink_count))
            .then_with(|| a.path.cmp(&b.path))
    });
    hubs.truncate(config.top_limit);
    orphans.sort();

    Ok(SweepReport {
        dead_link_count,
        dead_links,
        top_unlinked,
        hubs,
        orphans,
        generated_at: Some(Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use flywheel_core::{FieldMap, Note, Outlink};
    use std::collections::HashMap;

    struct FixedMentions(HashMap<String, usize>);

    #[async_trait]
    impl MentionCounts for FixedMentions {
        async fn count_mentions(&self, folded_name: &str) -> Result<usize> {
            Ok(self.0.get(folded_name).copied().unwrap_or(0))
        }
    }

    fn note(path: &str, outlinks: &[&str]) -> Note {
        Note {
            path: path.to_string(),
            title: flywheel_core::note_title(path),
            aliases: Vec::new(),
            front_matter: FieldMap::new(),
            tags: Default::default(),
            outlinks: outlinks
                .iter()
                .enumerate()
                .map(|(i, t)| Outlink {
                    target: t.to_string(),
                    line: (i + 1) as u32,
                })
                .collect(),
            modified: DateTime::UNIX_EPOCH,
            content_hash: String::new(),
            parse_error: false,
        }
    }

    fn config() -> SweepConfig {
        SweepConfig {
            hub_min_links: 2,
            ..SweepConfig::default()
        }
    }

    #[tokio::test]
    async fn reports_dead_links_and_orphans() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("a.md", &["Missing", "Missing", "b"]));
        graph.apply_note(note("b.md", &[]));
        graph.apply_note(note("island.md", &[]));

        let report = run_sweep(&graph, &FixedMentions(HashMap::new()), &config())
            .await
            .unwrap();
        assert_eq!(report.dead_link_count, 2);
        assert_eq!(report.dead_links[0].target, "Missing");
        assert_eq!(report.orphans, vec!["island.md".to_string()]);
    }

    #[tokio::test]
    async fn unlinked_mentions_subtract_backlinks_and_self() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("Topic.md", &[]));
        graph.apply_note(note("a.md", &["Topic"]));

        // 5 full-text mentions, 1 backlink, 1 self → 3 unlinked.
        let mentions = FixedMentions(HashMap::from([("topic".to_string(), 5)]));
        let report = run_sweep(&graph, &mentions, &config()).await.unwrap();
        let entry = report
            .top_unlinked
            .iter()
            .find(|u| u.path == "Topic.md")
            .unwrap();
        assert_eq!(entry.unlinked_mentions, 3);
    }

    #[tokio::test]
    async fn hubs_count_links_both_ways() {
        let mut graph = GraphIndex::new();
        graph.apply_note(note("hub.md", &["a"]));
        graph.apply_note(note("a.md", &["hub"]));
        graph.apply_note(note("b.md", &["hub"]));

        let report = run_sweep(&graph, &FixedMentions(HashMap::new()), &config())
            .await
            .unwrap();
        assert_eq!(report.hubs[0].path, "hub.md");
        assert_eq!(report.hubs[0].backlink_count, 2);
        assert_eq!(report.hubs[0].outlink_count, 1);
    }
}
