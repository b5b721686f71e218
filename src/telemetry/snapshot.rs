//! # Telemetry Snapshot
//!
//! A complete, self-consistent copy of every known telemetry field at one
//! instant. Snapshots are plain values: the aggregator hands out clones and
//! never a reference to its own instance.

use serde::Serialize;

/// Flight mode name shown before the first mode update
pub const UNKNOWN_FLIGHT_MODE: &str = "Unknown";

/// The six field groups. Fields within one group are always written together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    Position,
    Attitude,
    Velocity,
    Power,
    SatFix,
    ModeArm,
}

impl FieldGroup {
    /// All groups, in display order
    pub const ALL: [FieldGroup; 6] = [
        FieldGroup::Position,
        FieldGroup::Attitude,
        FieldGroup::Velocity,
        FieldGroup::Power,
        FieldGroup::SatFix,
        FieldGroup::ModeArm,
    ];
}

/// Latest known vehicle state.
///
/// # Examples
///
/// ```
/// use drone_dashboard::telemetry::TelemetrySnapshot;
///
/// let snapshot = TelemetrySnapshot::default();
/// assert_eq!(snapshot.flight_mode, "Unknown");
/// assert!(!snapshot.connected);
/// assert_eq!(snapshot.timestamp_ms, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    // Position
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude above mean sea level in meters
    pub altitude_msl: f32,
    /// Altitude relative to home in meters
    pub altitude_rel: f32,

    // Attitude (degrees)
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,

    // Velocity, NED frame (m/s)
    pub velocity_north: f32,
    pub velocity_east: f32,
    pub velocity_down: f32,

    // Power
    /// Battery voltage in volts
    pub battery_voltage: f32,
    /// Battery current in amps
    pub battery_current: f32,
    /// Remaining charge, 0-100 percent
    pub battery_remaining: f32,

    // Satellite fix
    pub gps_satellites: u32,
    /// GPS fix type code (0 = no GPS, 1 = no fix, 2 = 2D, 3 = 3D, ...)
    pub gps_fix_type: i32,

    // Flight mode
    pub flight_mode: String,
    pub armed: bool,

    // Meta
    pub connected: bool,
    /// Wall-clock time of the last applied update, milliseconds since epoch
    pub timestamp_ms: u64,
    /// Number of mutations applied before this snapshot was taken
    pub sequence: u64,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude_msl: 0.0,
            altitude_rel: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            velocity_north: 0.0,
            velocity_east: 0.0,
            velocity_down: 0.0,
            battery_voltage: 0.0,
            battery_current: 0.0,
            battery_remaining: 0.0,
            gps_satellites: 0,
            gps_fix_type: 0,
            flight_mode: UNKNOWN_FLIGHT_MODE.to_string(),
            armed: false,
            connected: false,
            timestamp_ms: 0,
            sequence: 0,
        }
    }
}

impl TelemetrySnapshot {
    /// True if `self` was published after `other`
    pub fn is_newer_than(&self, other: &TelemetrySnapshot) -> bool {
        self.sequence > other.sequence
    }
}
