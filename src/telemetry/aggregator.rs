//! # Telemetry Aggregator
//!
//! Serializes field-group updates arriving from independent delivery contexts
//! into one snapshot and publishes a copy to every observer after each change.
//!
//! The critical section covers only field assignment, stamping and the copy
//! out. Observers run after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::debug;

use super::snapshot::TelemetrySnapshot;
use super::update::TelemetryUpdate;

/// Callback receiving an independent copy of every published snapshot
pub type SnapshotObserver = Box<dyn Fn(TelemetrySnapshot) + Send + Sync>;

/// Source of "now" in milliseconds since epoch
pub type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

/// Wall-clock milliseconds since the Unix epoch
pub fn wall_clock_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Owner of the single mutable snapshot.
///
/// # Examples
///
/// ```
/// use drone_dashboard::telemetry::{TelemetryAggregator, TelemetryUpdate};
///
/// let aggregator = TelemetryAggregator::new();
/// aggregator.apply_update(TelemetryUpdate::armed(true));
///
/// let snapshot = aggregator.current_snapshot();
/// assert!(snapshot.armed);
/// assert!(snapshot.timestamp_ms > 0);
/// ```
pub struct TelemetryAggregator {
    current: Mutex<TelemetrySnapshot>,
    observers: RwLock<Vec<SnapshotObserver>>,
    clock: Clock,
}

impl std::fmt::Debug for TelemetryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryAggregator")
            .field("current", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryAggregator {
    /// Create an aggregator holding an all-defaults snapshot
    pub fn new() -> Self {
        Self::with_clock(Box::new(wall_clock_ms))
    }

    /// Create an aggregator with a custom time source
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            current: Mutex::new(TelemetrySnapshot::default()),
            observers: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Register an observer for every subsequently published snapshot
    pub fn subscribe(&self, observer: SnapshotObserver) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Apply one field-group update atomically, then publish.
    ///
    /// Only the fields owned by the update's group change, plus the
    /// timestamp and sequence.
    pub fn apply_update(&self, update: TelemetryUpdate) {
        let group = update.group();
        let published = {
            let mut current = self.lock();
            update.apply_to(&mut current);
            self.stamp(&mut current);
            current.clone()
        };
        debug!(?group, sequence = published.sequence, "applied telemetry update");
        self.publish(published);
    }

    /// Flip only the connectivity flag, then publish
    pub fn set_connected(&self, connected: bool) {
        let published = {
            let mut current = self.lock();
            current.connected = connected;
            self.stamp(&mut current);
            current.clone()
        };
        debug!(connected, sequence = published.sequence, "connection state changed");
        self.publish(published);
    }

    /// Copy of the current snapshot
    pub fn current_snapshot(&self) -> TelemetrySnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, TelemetrySnapshot> {
        // Every mutation is a plain field assignment, so a poisoned snapshot
        // is still fully formed.
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stamp(&self, snapshot: &mut TelemetrySnapshot) {
        snapshot.timestamp_ms = snapshot.timestamp_ms.max((self.clock)());
        snapshot.sequence += 1;
    }

    fn publish(&self, snapshot: TelemetrySnapshot) {
        let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner);
        for observer in observers.iter() {
            observer(snapshot.clone());
        }
    }
}

/// Latest-value slot between the aggregator and a consumer.
///
/// Publishing never blocks on the reader, and a snapshot older than the one
/// already held is dropped, so observers racing each other after the lock is
/// released cannot move the reader backwards.
#[derive(Clone)]
pub struct SnapshotSink {
    tx: Arc<watch::Sender<TelemetrySnapshot>>,
}

impl SnapshotSink {
    /// Create a sink and the receiver end read by the consumer
    pub fn channel() -> (Self, watch::Receiver<TelemetrySnapshot>) {
        let (tx, rx) = watch::channel(TelemetrySnapshot::default());
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Replace the held snapshot if `snapshot` is newer
    pub fn publish(&self, snapshot: TelemetrySnapshot) {
        self.tx.send_if_modified(|held| {
            if snapshot.is_newer_than(held) {
                *held = snapshot;
                true
            } else {
                false
            }
        });
    }

    /// Observer that forwards into this sink
    pub fn observer(&self) -> SnapshotObserver {
        let sink = self.clone();
        Box::new(move |snapshot| sink.publish(snapshot))
    }

    /// Another receiver on the same slot
    pub fn receiver(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.tx.subscribe()
    }
}
