//! Engine runtime: wires the watcher, event queue, graph, and store into
//! one lifecycle with explicit start and shutdown.
//!
//! Dataflow in steady state: watcher signals → event queue → the single
//! consumer task, which parses touched files once and applies the result
//! to the in-memory graph and the persistent store in that order. Queries
//! read the graph behind an `RwLock` and therefore always observe either
//! the pre-batch or post-batch state. The sweep timer reads a cloned
//! snapshot so it never holds the lock across store queries.

mod mirror;

pub use mirror::{entity_row, full_text_row};

use async_trait::async_trait;
use flywheel_core::{EngineConfig, Result};
use flywheel_events::{
    Batch, BatchKind, EventQueue, NotifyWatcher, PollingWatcher, RawEvent, RawEventKind,
    WatchSignal, Watcher,
};
use flywheel_graph::{read_note, run_sweep, walk_vault, GraphIndex, MentionCounts, SweepReport};
use flywheel_store::SqliteStore;
use flywheel_tools::ToolContext;
use flywheel_vcs::GitGateway;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Which watcher backend to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchBackend {
    #[default]
    Native,
    Polling,
}

/// A running engine. Dropping it abandons the background tasks; call
/// [`Engine::shutdown`] for an orderly stop.
pub struct Engine {
    ctx: ToolContext,
    watcher: Option<Box<dyn Watcher>>,
    consumer: JoinHandle<()>,
    forwarder: Option<JoinHandle<()>>,
    sweep_task: JoinHandle<()>,
}

impl Engine {
    /// Open the store, build the graph, and start the background tasks.
    pub async fn start(vault_root: &Path, config: EngineConfig) -> Result<Engine> {
        Self::start_with_backend(vault_root, config, WatchBackend::Native).await
    }

    pub async fn start_with_backend(
        vault_root: &Path,
        config: EngineConfig,
        backend: WatchBackend,
    ) -> Result<Engine> {
        let vault_root = vault_root.to_path_buf();
        let store = SqliteStore::open(&vault_root).await?;
        let graph = Arc::new(RwLock::new(GraphIndex::new()));
        let sweep = Arc::new(RwLock::new(SweepReport::default()));

        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(64);
        let queue = EventQueue::new(config.queue.clone(), batch_tx);

        let ctx = ToolContext {
            vault_root: vault_root.clone(),
            graph,
            store,
            gateway: Arc::new(GitGateway::new(config.commit.clone())),
            queue,
            config,
            sweep,
        };

        initial_build(&ctx).await?;

        let consumer = tokio::spawn(consume_batches(ctx.clone(), batch_rx));

        let mut watcher: Option<Box<dyn Watcher>> = None;
        let mut forwarder = None;
        if ctx.config.watch_enabled {
            let (signal_tx, signal_rx) = mpsc::unbounded_channel();
            let mut backend_impl: Box<dyn Watcher> = match backend {
                WatchBackend::Native => Box::new(NotifyWatcher::new()),
                WatchBackend::Polling => {
                    Box::new(PollingWatcher::new(ctx.config.queue.poll_interval_ms))
                }
            };
            backend_impl.start(&ctx.vault_root, signal_tx).await?;
            watcher = Some(backend_impl);
            forwarder = Some(tokio::spawn(forward_signals(ctx.clone(), signal_rx)));
        }

        // Sweep once after the bulk rebuild, then on the timer.
        let initial_report = compute_sweep(&ctx).await?;
        *ctx.sweep.write().await = initial_report;
        let sweep_task = tokio::spawn(sweep_loop(ctx.clone()));

        info!(root = %ctx.vault_root.display(), "engine started");
        Ok(Engine {
            ctx,
            watcher,
            consumer,
            forwarder,
            sweep_task,
        })
    }

    /// Context handle for the tool surface.
    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn vault_root(&self) -> &PathBuf {
        &self.ctx.vault_root
    }

    /// Flush pending events and give the consumer time to apply them.
    ///
    /// Intended for batch mode and tests; steady-state callers just let
    /// the debounce run.
    pub async fn settle(&self) {
        self.ctx.queue.flush().await;
        // The consumer drains the channel strictly in order; a second
        // flush round-trip plus a short grace period covers application.
        self.ctx.queue.flush().await;
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    }

    /// Stop the watcher, drain the queue and consumer, and close the store.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.stop().await;
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }

        self.ctx.queue.flush().await;
        self.ctx.queue.dispose().await;
        // Disposing the queue drops the batch sender; the consumer exits
        // once the channel drains.
        if let Err(err) = self.consumer.await {
            if !err.is_cancelled() {
                error!(error = %err, "consumer task failed during shutdown");
            }
        }
        self.sweep_task.abort();
        self.ctx.store.clone().close().await?;
        info!("engine shut down");
        Ok(())
    }

    /// Recompute the sweep report immediately (also runs on the timer).
    pub async fn run_sweep_now(&self) -> Result<SweepReport> {
        let report = compute_sweep(&self.ctx).await?;
        *self.ctx.sweep.write().await = report.clone();
        Ok(report)
    }
}

/// Scan the vault, build the graph, and mirror every note into the store.
/// Rows for files deleted while the engine was down are removed.
async fn initial_build(ctx: &ToolContext) -> Result<()> {
    let files = walk_vault(&ctx.vault_root).await?;
    let on_disk: BTreeSet<&String> = files.iter().collect();

    {
        let mut graph = ctx.graph.write().await;
        for rel in &files {
            if let Some((note, body)) = read_note(&ctx.vault_root, rel).await? {
                ctx.store.upsert_note(&mirror::full_text_row(&note, &body)).await?;
                ctx.store.upsert_entity(&mirror::entity_row(&note)).await?;
                graph.apply_note(note);
            }
        }
    }

    for stale in ctx.store.list_note_paths().await? {
        if !on_disk.contains(&stale) {
            ctx.store.delete_note(&stale).await?;
        }
    }

    info!(notes = files.len(), "initial index build complete");
    Ok(())
}

/// The single writer: applies coalesced batches to graph and store.
async fn consume_batches(ctx: ToolContext, mut rx: mpsc::Receiver<Batch>) {
    while let Some(batch) = rx.recv().await {
        for item in batch.items {
            let result = match item.kind {
                BatchKind::Upsert => apply_upsert(&ctx, &item.path).await,
                BatchKind::Delete => apply_delete(&ctx, &item.path).await,
            };
            if let Err(err) = result {
                error!(path = %item.path, error = %err, "failed to apply batch item");
            }
        }
    }
}

async fn apply_upsert(ctx: &ToolContext, rel: &str) -> Result<()> {
    match read_note(&ctx.vault_root, rel).await? {
        Some((note, body)) => {
            ctx.store.upsert_note(&mirror::full_text_row(&note, &body)).await?;
            ctx.store.upsert_entity(&mirror::entity_row(&note)).await?;
            ctx.graph.write().await.apply_note(note);
        }
        None => {
            apply_delete(ctx, rel).await?;
        }
    }
    Ok(())
}

async fn apply_delete(ctx: &ToolContext, rel: &str) -> Result<()> {
    let removed_path = {
        let mut graph = ctx.graph.write().await;
        let display = graph.note(rel).map(|n| n.path.clone());
        graph.delete(rel);
        display
    };
    ctx.store
        .delete_note(removed_path.as_deref().unwrap_or(rel))
        .await?;
    Ok(())
}

/// Translate watcher signals into queue pushes; a rescan request replays
/// the whole vault through the queue.
async fn forward_signals(ctx: ToolContext, mut rx: mpsc::UnboundedReceiver<WatchSignal>) {
    while let Some(signal) = rx.recv().await {
        match signal {
            WatchSignal::Event(event) => ctx.queue.push(event),
            WatchSignal::RescanNeeded => {
                warn!("watcher requested rescan");
                if let Err(err) = rescan(&ctx).await {
                    error!(error = %err, "rescan failed");
                }
            }
        }
    }
}

/// Self-heal: diff the on-disk file set against the graph and enqueue the
/// difference as synthetic events.
async fn rescan(ctx: &ToolContext) -> Result<()> {
    let files = walk_vault(&ctx.vault_root).await?;
    let on_disk: BTreeSet<&String> = files.iter().collect();

    for rel in &files {
        ctx.queue.push(RawEvent::new(rel.clone(), RawEventKind::Change));
    }
    let indexed: Vec<String> = {
        let graph = ctx.graph.read().await;
        graph.notes().map(|n| n.path.clone()).collect()
    };
    for rel in indexed {
        if !on_disk.contains(&rel) {
            ctx.queue.push(RawEvent::new(rel, RawEventKind::Unlink));
        }
    }
    Ok(())
}

struct StoreMentions(SqliteStore);

#[async_trait]
impl MentionCounts for StoreMentions {
    async fn count_mentions(&self, folded_name: &str) -> Result<usize> {
        self.0.count_mentions(folded_name).await
    }
}

async fn compute_sweep(ctx: &ToolContext) -> Result<SweepReport> {
    // Clone the snapshot so the lock is not held across store queries.
    let snapshot = ctx.graph.read().await.clone();
    let mentions = StoreMentions(ctx.store.clone());
    run_sweep(&snapshot, &mentions, &ctx.config.sweep).await
}

async fn sweep_loop(ctx: ToolContext) {
    let interval = std::time::Duration::from_millis(ctx.config.sweep.interval_ms.max(1000));
    loop {
        tokio::time::sleep(interval).await;
        match compute_sweep(&ctx).await {
            Ok(report) => {
                *ctx.sweep.write().await = report;
            }
            Err(err) => warn!(error = %err, "sweep failed"),
        }
    }
}
