//! Reconciler supervisor: one consume task per feed.
//!
//! Each feed gets its own `StreamReconciler`, entry channel and task. Tasks
//! share nothing except the cancellation token and the redraw sink, so a
//! stall or burst on one feed never holds up the other. Snapshots are handed
//! to readers through a `watch` channel (single writer, many readers).

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use wtradar_core::{ChatMessage, Event, FeedEntry, FeedKind, PlayerIdentity, Snapshot, StreamReconciler};

/// Latest snapshot of one feed, as seen by readers.
pub type SnapshotRx<E> = watch::Receiver<Arc<Snapshot<E>>>;

/// Fired after every successful `consume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RedrawNotification {
    pub feed: FeedKind,
    pub session: u64,
    pub version: u64,
}

/// Receives redraw notifications from every feed task.
///
/// Called from the feed tasks themselves; implementations must not block.
pub trait RedrawSink: Send + Sync + 'static {
    fn snapshot_published(&self, notification: RedrawNotification);
}

impl<F> RedrawSink for F
where
    F: Fn(RedrawNotification) + Send + Sync + 'static,
{
    fn snapshot_published(&self, notification: RedrawNotification) {
        self(notification)
    }
}

// ─── Feed channels ───────────────────────────────────────────────

/// Producer halves, held by the telemetry source.
#[derive(Debug, Clone)]
pub struct FeedSenders {
    pub battle_log: mpsc::Sender<Event>,
    pub chat: mpsc::Sender<ChatMessage>,
}

/// Consumer halves, moved into the supervisor.
#[derive(Debug)]
pub struct FeedReceivers {
    pub battle_log: mpsc::Receiver<Event>,
    pub chat: mpsc::Receiver<ChatMessage>,
}

/// Create one bounded channel per feed.
pub fn feed_channels(capacity: usize) -> (FeedSenders, FeedReceivers) {
    let capacity = capacity.max(1);
    let (battle_tx, battle_rx) = mpsc::channel(capacity);
    let (chat_tx, chat_rx) = mpsc::channel(capacity);
    (
        FeedSenders {
            battle_log: battle_tx,
            chat: chat_tx,
        },
        FeedReceivers {
            battle_log: battle_rx,
            chat: chat_rx,
        },
    )
}

// ─── Feed exit reporting ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The source closed the feed's stream.
    StreamClosed,
    /// The shared cancellation token fired.
    Cancelled,
}

/// Per-feed report returned to the supervision boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedExit {
    pub feed: FeedKind,
    pub consumed: u64,
    pub sessions: u64,
    pub reason: ExitReason,
}

// ─── Supervisor ──────────────────────────────────────────────────

pub struct ReconcilerSupervisor {
    cancel: CancellationToken,
    battle_log: SnapshotRx<Event>,
    chat: SnapshotRx<ChatMessage>,
    tasks: Vec<JoinHandle<FeedExit>>,
}

impl ReconcilerSupervisor {
    /// Spawn one consume task per feed. Must be called inside a tokio runtime.
    pub fn spawn(
        identity: Arc<dyn PlayerIdentity>,
        feeds: FeedReceivers,
        sink: Arc<dyn RedrawSink>,
        cancel: CancellationToken,
    ) -> Self {
        let (battle_task, battle_log) = spawn_feed::<Event>(
            Arc::clone(&identity),
            feeds.battle_log,
            Arc::clone(&sink),
            cancel.clone(),
        );
        let (chat_task, chat) = spawn_feed::<ChatMessage>(identity, feeds.chat, sink, cancel.clone());

        info!("reconciler supervisor started");
        Self {
            cancel,
            battle_log,
            chat,
            tasks: vec![battle_task, chat_task],
        }
    }

    /// Subscribe to battle-log snapshots.
    pub fn battle_log(&self) -> SnapshotRx<Event> {
        self.battle_log.clone()
    }

    /// Subscribe to chat snapshots.
    pub fn chat(&self) -> SnapshotRx<ChatMessage> {
        self.chat.clone()
    }

    /// Ask every feed task to stop after its in-flight entry.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for every feed task to finish.
    pub async fn join(self) -> Result<Vec<FeedExit>, JoinError> {
        let mut exits = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            exits.push(task.await?);
        }
        Ok(exits)
    }
}

fn spawn_feed<E: FeedEntry>(
    identity: Arc<dyn PlayerIdentity>,
    rx: mpsc::Receiver<E>,
    sink: Arc<dyn RedrawSink>,
    cancel: CancellationToken,
) -> (JoinHandle<FeedExit>, SnapshotRx<E>) {
    let reconciler = StreamReconciler::<E>::new(identity);
    let (publish, snapshots) = watch::channel(reconciler.snapshot());
    let task = tokio::spawn(run_feed(reconciler, rx, publish, sink, cancel));
    (task, snapshots)
}

/// Consume loop for one feed. Runs until the stream closes or `cancel`
/// fires; cancellation is checked before every entry.
async fn run_feed<E: FeedEntry>(
    mut reconciler: StreamReconciler<E>,
    mut rx: mpsc::Receiver<E>,
    publish: watch::Sender<Arc<Snapshot<E>>>,
    sink: Arc<dyn RedrawSink>,
    cancel: CancellationToken,
) -> FeedExit {
    let feed = E::FEED;
    let mut consumed = 0u64;
    info!(%feed, "feed task started");

    let reason = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break ExitReason::Cancelled,
            entry = rx.recv() => {
                let Some(entry) = entry else {
                    break ExitReason::StreamClosed;
                };
                let outcome = reconciler.consume(entry);
                consumed += 1;

                let snapshot = outcome.snapshot;
                if outcome.transition.is_rollover() {
                    info!(%feed, session = snapshot.session, "new battle session detected");
                }
                if let Some((vehicle, count)) = &outcome.trophy {
                    debug!(%feed, vehicle = %vehicle, count, "trophy recorded");
                }
                debug!(
                    %feed,
                    session = snapshot.session,
                    version = snapshot.version,
                    audience = ?outcome.audience,
                    "entry reconciled"
                );

                let notification = RedrawNotification {
                    feed,
                    session: snapshot.session,
                    version: snapshot.version,
                };
                publish.send_replace(snapshot);
                sink.snapshot_published(notification);
            }
        }
    };

    let sessions = reconciler.snapshot().session;
    info!(%feed, consumed, sessions, reason = ?reason, "feed task stopped");
    FeedExit {
        feed,
        consumed,
        sessions,
        reason,
    }
}
