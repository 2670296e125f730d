//! Debounced, coalescing event queue.
//!
//! A single actor task owns all pending state. Per-path quiet periods,
//! the flush ceiling, and the batch-size force flush all resolve inside
//! the actor, so consumers only ever see ordered, coalesced batches.

use crate::{coalesce, Batch, RawEvent};
use flywheel_core::QueueConfig;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, warn};

enum Msg {
    Event(RawEvent),
    Flush(oneshot::Sender<()>),
    Dispose(oneshot::Sender<()>),
}

/// Handle to the queue actor.
///
/// Cheap to clone; all clones feed the same actor. [`EventQueue::dispose`]
/// clears pending state and guarantees no dispatch afterwards.
#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<Msg>,
}

impl EventQueue {
    pub fn new(config: QueueConfig, sink: mpsc::Sender<Batch>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = QueueActor {
            config,
            sink,
            pending: HashMap::new(),
            order: Vec::new(),
            flush_deadline: None,
        };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    /// Enqueue a raw event. Events pushed after dispose are dropped.
    pub fn push(&self, event: RawEvent) {
        if self.tx.send(Msg::Event(event)).is_err() {
            debug!("event dropped: queue disposed");
        }
    }

    /// Dispatch everything pending immediately, regardless of debounce.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Msg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Clear pending state and stop the actor. No batch is dispatched for
    /// events that were still pending.
    pub async fn dispose(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Msg::Dispose(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

struct PendingPath {
    events: Vec<RawEvent>,
    deadline: Instant,
}

struct QueueActor {
    config: QueueConfig,
    sink: mpsc::Sender<Batch>,
    pending: HashMap<String, PendingPath>,
    /// First-seen path order; batches are emitted in this order.
    order: Vec<String>,
    flush_deadline: Option<Instant>,
}

impl QueueActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        loop {
            match self.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        msg = rx.recv() => {
                            if self.handle(msg).await {
                                return;
                            }
                        }
                        _ = sleep_until(deadline) => self.on_tick().await,
                    }
                }
                None => {
                    if self.handle(rx.recv().await).await {
                        return;
                    }
                }
            }
        }
    }

    /// Returns true when the actor should stop.
    async fn handle(&mut self, msg: Option<Msg>) -> bool {
        match msg {
            Some(Msg::Event(event)) => {
                self.on_event(event).await;
                false
            }
            Some(Msg::Flush(ack)) => {
                self.flush_all().await;
                let _ = ack.send(());
                false
            }
            Some(Msg::Dispose(ack)) => {
                let dropped = self.pending.len();
                if dropped > 0 {
                    debug!(dropped, "queue disposed with pending paths");
                }
                self.pending.clear();
                self.order.clear();
                let _ = ack.send(());
                true
            }
            // All handles dropped: flush what's pending, then stop.
            None => {
                self.flush_all().await;
                true
            }
        }
    }

    async fn on_event(&mut self, event: RawEvent) {
        let now = Instant::now();
        let entry = self
            .pending
            .entry(event.path.clone())
            .or_insert_with(|| PendingPath {
                events: Vec::new(),
                deadline: now,
            });
        if entry.events.is_empty() {
            self.order.push(event.path.clone());
        }
        entry.deadline = now + Duration::from_millis(self.config.debounce_ms);
        entry.events.push(event);

        if self.flush_deadline.is_none() {
            self.flush_deadline = Some(now + Duration::from_millis(self.config.flush_ms));
        }
        if self.pending.len() >= self.config.batch_size {
            debug!(paths = self.pending.len(), "batch size reached, force flush");
            self.flush_all().await;
        }
    }

    async fn on_tick(&mut self) {
        let now = Instant::now();
        if self.flush_deadline.is_some_and(|d| d <= now) {
            self.flush_all().await;
            return;
        }

        let expired: Vec<String> = self
            .order
            .iter()
            .filter(|p| self.pending.get(*p).is_some_and(|e| e.deadline <= now))
            .cloned()
            .collect();
        if expired.is_empty() {
            return;
        }

        let mut batch = Batch::default();
        for path in &expired {
            if let Some(entry) = self.pending.remove(path) {
                if let Some(item) = coalesce(path.clone(), entry.events) {
                    batch.items.push(item);
                }
            }
        }
        self.order.retain(|p| self.pending.contains_key(p));
        self.flush_deadline = if self.pending.is_empty() {
            None
        } else {
            Some(now + Duration::from_millis(self.config.flush_ms))
        };
        self.dispatch(batch).await;
    }

    async fn flush_all(&mut self) {
        let mut batch = Batch::default();
        for path in std::mem::take(&mut self.order) {
            if let Some(entry) = self.pending.remove(&path) {
                if let Some(item) = coalesce(path, entry.events) {
                    batch.items.push(item);
                }
            }
        }
        self.flush_deadline = None;
        self.dispatch(batch).await;
    }

    async fn dispatch(&mut self, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        debug!(items = batch.items.len(), "dispatching batch");
        if self.sink.send(batch).await.is_err() {
            warn!("batch consumer dropped, discarding batch");
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let path_min = self.pending.values().map(|e| e.deadline).min();
        match (path_min, self.flush_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        }
    }
}
