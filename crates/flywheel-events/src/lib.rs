//! File-event plumbing: raw events, the debounced coalescing queue, and
//! watcher backends.
//!
//! The queue owns all timing semantics (per-path debounce, flush ceiling,
//! batch-size force flush); watcher backends are deliberately dumb pipes
//! that normalise platform notifications into [`RawEvent`]s.

mod queue;
mod watcher;

pub use queue::EventQueue;
pub use watcher::{NotifyWatcher, PollingWatcher, WatchSignal, Watcher};

use serde::Serialize;

/// Raw filesystem event kind as delivered by a watcher backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RawEventKind {
    Add,
    Change,
    Unlink,
}

/// One raw filesystem event for a watched, vault-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawEvent {
    pub path: String,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn new(path: impl Into<String>, kind: RawEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Collapsed per-path action the indexer acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Upsert,
    Delete,
}

/// One coalesced path in a batch.
///
/// `original_events` is kept for diagnostics only; consumers act on the
/// collapsed `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub path: String,
    pub kind: BatchKind,
    pub original_events: Vec<RawEvent>,
}

/// An ordered batch of coalesced items delivered to the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Batch {
    pub items: Vec<BatchItem>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Collapse a path's raw event sequence per the coalescing table:
/// a sequence ending in unlink is a delete, anything else is an upsert.
pub(crate) fn coalesce(path: String, events: Vec<RawEvent>) -> Option<BatchItem> {
    let last = events.last()?;
    let kind = match last.kind {
        RawEventKind::Unlink => BatchKind::Delete,
        RawEventKind::Add | RawEventKind::Change => BatchKind::Upsert,
    };
    Some(BatchItem {
        path,
        kind,
        original_events: events,
    })
}
