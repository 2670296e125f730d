//! Engine configuration.
//!
//! Every tunable the engine honours is enumerated here with its default;
//! components receive their own section rather than the whole struct.

use serde::{Deserialize, Serialize};

/// Event-queue tuning (see `flywheel-events`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Per-path quiet period before a pending event is dispatched.
    pub debounce_ms: u64,
    /// Ceiling between batches; everything pending flushes at this cadence.
    pub flush_ms: u64,
    /// Force-flush when this many unique paths are pending.
    pub batch_size: usize,
    /// Scan cadence for the polling watcher backend.
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            flush_ms: 1000,
            batch_size: 50,
            poll_interval_ms: 2000,
        }
    }
}

/// Commit retry policy (see `flywheel-vcs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
            jitter: true,
        }
    }
}

/// Sweep cadence and thresholds (see `flywheel-graph::sweep`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub interval_ms: u64,
    /// Notes with `backlinks + outlinks` at or above this count are hubs.
    pub hub_min_links: usize,
    pub include_orphans: bool,
    /// Length cap for ranked lists in the report.
    pub top_limit: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300_000,
            hub_min_links: 8,
            include_orphans: true,
            top_limit: 20,
        }
    }
}

/// Auto-wikilink scoring constants (see `flywheel-autolink`).
///
/// The constants are empirical; they are configuration, not behaviour, and
/// the resolver is a pure function of text, catalogue, and this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutolinkConfig {
    /// Minimum score for an entity to be linked in place.
    pub link_threshold: f64,
    /// Minimum score for an entity to be returned as a suggestion.
    pub suggest_threshold: f64,
    /// Score contribution per additional occurrence of the name.
    pub occurrence_weight: f64,
    /// Score contribution when every occurrence sits on word boundaries.
    pub boundary_weight: f64,
    /// Boost when the source folder declares an affinity for the category.
    pub folder_affinity_boost: f64,
    /// Penalty applied to names shorter than `min_name_len`.
    pub short_name_penalty: f64,
    /// Names below this length are penalised unless registered acronyms.
    pub min_name_len: usize,
    /// Ceiling on the total occurrence bonus, so mention-heavy text cannot
    /// buy its way past the other signals.
    pub max_occurrence_bonus: f64,
    /// Per-category base weights, `people` first.
    pub category_weights: CategoryWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub people: f64,
    pub projects: f64,
    pub technologies: f64,
    pub acronyms: f64,
    pub organisations: f64,
    pub locations: f64,
    pub concepts: f64,
    pub other: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            people: 1.3,
            projects: 1.2,
            technologies: 1.1,
            acronyms: 1.0,
            organisations: 1.0,
            locations: 0.9,
            concepts: 0.8,
            other: 0.7,
        }
    }
}

impl Default for AutolinkConfig {
    fn default() -> Self {
        Self {
            link_threshold: 1.5,
            suggest_threshold: 1.0,
            occurrence_weight: 0.5,
            boundary_weight: 1.0,
            folder_affinity_boost: 0.75,
            short_name_penalty: 1.5,
            min_name_len: 3,
            max_occurrence_bonus: 1.0,
            category_weights: CategoryWeights::default(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Disable to run in batch mode without a filesystem watcher.
    #[serde(default = "default_watch_enabled")]
    pub watch_enabled: bool,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub autolink: AutolinkConfig,
}

fn default_watch_enabled() -> bool {
    true
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            watch_enabled: true,
            ..Self::default()
        }
    }

    pub fn with_watch_enabled(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_sweep(mut self, sweep: SweepConfig) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn with_commit(mut self, commit: CommitConfig) -> Self {
        self.commit = commit;
        self
    }
}
