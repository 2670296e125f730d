//! Watcher backends: native notifications and mtime polling.

use crate::{RawEvent, RawEventKind};
use async_trait::async_trait;
use flywheel_core::paths::{is_watched_path, to_vault_relative, IGNORED_DIRS};
use flywheel_core::{Error, Result};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyBackend};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What a watcher backend can tell the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    Event(RawEvent),
    /// The backend hit an error it cannot attribute to a path; the engine
    /// recovers by rescanning the vault.
    RescanNeeded,
}

/// Capability implemented by both backends; the queue is watcher-agnostic.
#[async_trait]
pub trait Watcher: Send {
    async fn start(
        &mut self,
        root: &Path,
        signals: mpsc::UnboundedSender<WatchSignal>,
    ) -> Result<()>;

    async fn stop(&mut self);
}

/// Native filesystem notifications via `notify`'s recommended backend.
#[derive(Default)]
pub struct NotifyWatcher {
    inner: Option<RecommendedWatcher>,
}

impl NotifyWatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Watcher for NotifyWatcher {
    async fn start(
        &mut self,
        root: &Path,
        signals: mpsc::UnboundedSender<WatchSignal>,
    ) -> Result<()> {
        let root_buf = root.to_path_buf();
        let mut backend = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for raw in translate_event(&root_buf, &event) {
                        let _ = signals.send(WatchSignal::Event(raw));
                    }
                }
                Err(err) => {
                    warn!(error = %err, "watcher backend error");
                    let _ = signals.send(WatchSignal::RescanNeeded);
                }
            }
        })
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        backend
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        debug!(root = %root.display(), "native watcher started");
        self.inner = Some(backend);
        Ok(())
    }

    async fn stop(&mut self) {
        self.inner = None;
    }
}

fn translate_event(root: &Path, event: &notify::Event) -> Vec<RawEvent> {
    let mut out = Vec::new();
    for path in &event.paths {
        let Some(rel) = to_vault_relative(root, path) else {
            continue;
        };
        if !is_watched_path(&rel) {
            continue;
        }
        let kind = match event.kind {
            EventKind::Create(_) => RawEventKind::Add,
            EventKind::Remove(_) => RawEventKind::Unlink,
            // Renames arrive as name-modify events on both halves; existence
            // tells the halves apart.
            EventKind::Modify(ModifyKind::Name(_)) => {
                if path.exists() {
                    RawEventKind::Add
                } else {
                    RawEventKind::Unlink
                }
            }
            EventKind::Modify(_) => RawEventKind::Change,
            _ => continue,
        };
        out.push(RawEvent::new(rel, kind));
    }
    out
}

/// Fallback backend that diffs mtime/size snapshots on an interval.
///
/// Used where native watching is unavailable (network mounts, some
/// containers).
pub struct PollingWatcher {
    interval_ms: u64,
    task: Option<JoinHandle<()>>,
}

impl PollingWatcher {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            task: None,
        }
    }
}

#[async_trait]
impl Watcher for PollingWatcher {
    async fn start(
        &mut self,
        root: &Path,
        signals: mpsc::UnboundedSender<WatchSignal>,
    ) -> Result<()> {
        let root = root.to_path_buf();
        let interval = std::time::Duration::from_millis(self.interval_ms.max(50));
        let task = tokio::spawn(async move {
            let mut previous = match take_snapshot(&root).await {
                Ok(snap) => snap,
                Err(err) => {
                    warn!(error = %err, "initial poll scan failed");
                    HashMap::new()
                }
            };
            loop {
                tokio::time::sleep(interval).await;
                let current = match take_snapshot(&root).await {
                    Ok(snap) => snap,
                    Err(err) => {
                        warn!(error = %err, "poll scan failed");
                        let _ = signals.send(WatchSignal::RescanNeeded);
                        continue;
                    }
                };
                for event in diff_snapshots(&previous, &current) {
                    if signals.send(WatchSignal::Event(event)).is_err() {
                        return;
                    }
                }
                previous = current;
            }
        });
        debug!(interval_ms = self.interval_ms, "polling watcher started");
        self.task = Some(task);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type Snapshot = HashMap<String, (SystemTime, u64)>;

async fn take_snapshot(root: &Path) -> Result<Snapshot> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut snap = Snapshot::new();
        walk_into(&root, &root, &mut snap)?;
        Ok(snap)
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?
}

fn walk_into(root: &Path, dir: &Path, snap: &mut Snapshot) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if IGNORED_DIRS.contains(&name.as_ref()) || name.starts_with('.') {
                continue;
            }
            walk_into(root, &path, snap)?;
        } else if file_type.is_file() {
            let Some(rel) = to_vault_relative(root, &path) else {
                continue;
            };
            if !is_watched_path(&rel) {
                continue;
            }
            let meta = entry.metadata()?;
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            snap.insert(rel, (mtime, meta.len()));
        }
    }
    Ok(())
}

fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Vec<RawEvent> {
    let mut events = Vec::new();
    for (path, stat) in current {
        match previous.get(path) {
            None => events.push(RawEvent::new(path.clone(), RawEventKind::Add)),
            Some(old) if old != stat => {
                events.push(RawEvent::new(path.clone(), RawEventKind::Change));
            }
            Some(_) => {}
        }
    }
    for path in previous.keys() {
        if !current.contains_key(path) {
            events.push(RawEvent::new(path.clone(), RawEventKind::Unlink));
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_detects_add_change_unlink() {
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + std::time::Duration::from_secs(1);
        let mut prev = Snapshot::new();
        prev.insert("kept.md".into(), (t0, 10));
        prev.insert("changed.md".into(), (t0, 10));
        prev.insert("gone.md".into(), (t0, 10));
        let mut cur = Snapshot::new();
        cur.insert("kept.md".into(), (t0, 10));
        cur.insert("changed.md".into(), (t1, 12));
        cur.insert("new.md".into(), (t1, 5));

        let mut kinds: Vec<(String, RawEventKind)> = diff_snapshots(&prev, &cur)
            .into_iter()
            .map(|e| (e.path, e.kind))
            .collect();
        kinds.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            kinds,
            vec![
                ("changed.md".to_string(), RawEventKind::Change),
                ("gone.md".to_string(), RawEventKind::Unlink),
                ("new.md".to_string(), RawEventKind::Add),
            ]
        );
    }
}
