//! # Telemetry Module
//!
//! Shared telemetry state between the source and the display.
//!
//! This module handles:
//! - The snapshot value type and its six field groups
//! - Applying field-group updates atomically and publishing copies
//! - Optional JSONL recording of published snapshots

pub mod aggregator;
pub mod recorder;
pub mod snapshot;
pub mod update;

pub use aggregator::{SnapshotObserver, SnapshotSink, TelemetryAggregator};
pub use snapshot::{FieldGroup, TelemetrySnapshot};
pub use update::TelemetryUpdate;
