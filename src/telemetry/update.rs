//! # Telemetry Updates
//!
//! Tagged partial updates, one variant per field group. Each variant carries
//! exactly the fields its group owns.

use super::snapshot::{FieldGroup, TelemetrySnapshot};

/// A field-group update delivered by a telemetry source
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryUpdate {
    Position {
        latitude: f64,
        longitude: f64,
        altitude_msl: f32,
        altitude_rel: f32,
    },
    Attitude {
        roll: f32,
        pitch: f32,
        yaw: f32,
    },
    Velocity {
        north: f32,
        east: f32,
        down: f32,
    },
    Power {
        voltage: f32,
        current: f32,
        remaining: f32,
    },
    SatFix {
        satellites: u32,
        fix_type: i32,
    },
    /// Mode and armed state. A `None` leaves that field as it was, so the
    /// source can report a mode change and an arming change separately.
    ModeArm {
        flight_mode: Option<String>,
        armed: Option<bool>,
    },
}

impl TelemetryUpdate {
    /// Update carrying only the armed flag
    pub fn armed(armed: bool) -> Self {
        TelemetryUpdate::ModeArm { flight_mode: None, armed: Some(armed) }
    }

    /// Update carrying only the flight mode name
    pub fn flight_mode(mode: impl Into<String>) -> Self {
        TelemetryUpdate::ModeArm { flight_mode: Some(mode.into()), armed: None }
    }

    /// The group this update belongs to
    pub fn group(&self) -> FieldGroup {
        match self {
            TelemetryUpdate::Position { .. } => FieldGroup::Position,
            TelemetryUpdate::Attitude { .. } => FieldGroup::Attitude,
            TelemetryUpdate::Velocity { .. } => FieldGroup::Velocity,
            TelemetryUpdate::Power { .. } => FieldGroup::Power,
            TelemetryUpdate::SatFix { .. } => FieldGroup::SatFix,
            TelemetryUpdate::ModeArm { .. } => FieldGroup::ModeArm,
        }
    }

    /// Overwrite the fields owned by this update's group. Nothing else is touched.
    pub(crate) fn apply_to(self, snapshot: &mut TelemetrySnapshot) {
        match self {
            TelemetryUpdate::Position { latitude, longitude, altitude_msl, altitude_rel } => {
                snapshot.latitude = latitude;
                snapshot.longitude = longitude;
                snapshot.altitude_msl = altitude_msl;
                snapshot.altitude_rel = altitude_rel;
            }
            TelemetryUpdate::Attitude { roll, pitch, yaw } => {
                snapshot.roll = roll;
                snapshot.pitch = pitch;
                snapshot.yaw = yaw;
            }
            TelemetryUpdate::Velocity { north, east, down } => {
                snapshot.velocity_north = north;
                snapshot.velocity_east = east;
                snapshot.velocity_down = down;
            }
            TelemetryUpdate::Power { voltage, current, remaining } => {
                snapshot.battery_voltage = voltage;
                snapshot.battery_current = current;
                snapshot.battery_remaining = remaining;
            }
            TelemetryUpdate::SatFix { satellites, fix_type } => {
                snapshot.gps_satellites = satellites;
                snapshot.gps_fix_type = fix_type;
            }
            TelemetryUpdate::ModeArm { flight_mode, armed } => {
                if let Some(mode) = flight_mode {
                    snapshot.flight_mode = mode;
                }
                if let Some(armed) = armed {
                    snapshot.armed = armed;
                }
            }
        }
    }
}
