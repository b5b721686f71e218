//! # Telemetry Source Module
//!
//! Boundary with the vehicle. A source connects to an address, waits a
//! bounded time for an autopilot to appear, then delivers field-group
//! updates into the aggregator from its own threads until disconnected.

pub mod address;
pub mod decode;
pub mod mavlink;

use std::sync::Arc;

use crate::error::Result;
use crate::telemetry::TelemetryAggregator;

pub use self::mavlink::MavlinkSource;

/// A producer of telemetry updates
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySource: Send {
    /// Connect to `address` and start delivering updates into `aggregator`.
    ///
    /// # Errors
    ///
    /// Returns a connection failure if the address cannot be opened or no
    /// autopilot appears within the bounded wait.
    fn connect(&mut self, address: &str, aggregator: Arc<TelemetryAggregator>) -> Result<()>;

    /// Stop delivering updates and mark the aggregator disconnected.
    /// Calling it again, or before `connect`, does nothing.
    fn disconnect(&mut self);
}
