//! # MAVLink Decoding
//!
//! Maps incoming MAVLink messages onto the six telemetry field groups.
//!
//! | Message | Group | Conversion |
//! |---------|-------|------------|
//! | `GLOBAL_POSITION_INT` | Position | 1e-7 deg → deg, mm → m |
//! | `ATTITUDE` | Attitude | rad → deg |
//! | `LOCAL_POSITION_NED` | Velocity | m/s, NED |
//! | `SYS_STATUS` | Power | mV → V, cA → A, percent |
//! | `GPS_RAW_INT` | SatFix | satellites, fix type code |
//! | `HEARTBEAT` (autopilot) | ModeArm | PX4 or ArduCopter custom mode, safety-armed flag |

use mavlink::common::{
    MavAutopilot, MavMessage, MavModeFlag, MavType, HEARTBEAT_DATA, SYS_STATUS_DATA,
};

use crate::telemetry::snapshot::UNKNOWN_FLIGHT_MODE;
use crate::telemetry::TelemetryUpdate;

// PX4 main modes (custom_mode byte 2)
const PX4_MAIN_MANUAL: u8 = 1;
const PX4_MAIN_ALTCTL: u8 = 2;
const PX4_MAIN_POSCTL: u8 = 3;
const PX4_MAIN_AUTO: u8 = 4;
const PX4_MAIN_ACRO: u8 = 5;
const PX4_MAIN_OFFBOARD: u8 = 6;
const PX4_MAIN_STABILIZED: u8 = 7;
const PX4_MAIN_RATTITUDE: u8 = 8;

// PX4 AUTO sub modes (custom_mode byte 3)
const PX4_AUTO_READY: u8 = 1;
const PX4_AUTO_TAKEOFF: u8 = 2;
const PX4_AUTO_LOITER: u8 = 3;
const PX4_AUTO_MISSION: u8 = 4;
const PX4_AUTO_RTL: u8 = 5;
const PX4_AUTO_LAND: u8 = 6;
const PX4_AUTO_FOLLOW_TARGET: u8 = 8;
const PX4_AUTO_PRECLAND: u8 = 9;

// ArduCopter flight modes (custom_mode)
const COPTER_STABILIZE: u32 = 0;
const COPTER_ACRO: u32 = 1;
const COPTER_ALT_HOLD: u32 = 2;
const COPTER_AUTO: u32 = 3;
const COPTER_GUIDED: u32 = 4;
const COPTER_LOITER: u32 = 5;
const COPTER_RTL: u32 = 6;
const COPTER_LAND: u32 = 9;
const COPTER_POSHOLD: u32 = 16;
const COPTER_BRAKE: u32 = 17;
const COPTER_SMART_RTL: u32 = 21;
const COPTER_FOLLOW: u32 = 23;
const COPTER_AUTO_RTL: u32 = 27;

/// Convert a message into a field-group update, if it carries one
pub fn decode(msg: &MavMessage) -> Option<TelemetryUpdate> {
    match msg {
        MavMessage::GLOBAL_POSITION_INT(p) => {
            Some(position_update(p.lat, p.lon, p.alt, p.relative_alt))
        }
        MavMessage::ATTITUDE(a) => Some(attitude_update(a.roll, a.pitch, a.yaw)),
        MavMessage::LOCAL_POSITION_NED(l) => Some(TelemetryUpdate::Velocity {
            north: l.vx,
            east: l.vy,
            down: l.vz,
        }),
        MavMessage::SYS_STATUS(s) => Some(power_update(
            s.voltage_battery,
            s.current_battery,
            s.battery_remaining,
        )),
        MavMessage::GPS_RAW_INT(g) => Some(TelemetryUpdate::SatFix {
            satellites: g.satellites_visible as u32,
            fix_type: g.fix_type as i32,
        }),
        MavMessage::HEARTBEAT(hb) if is_autopilot(hb) => Some(mode_arm_update(hb)),
        _ => None,
    }
}

/// True for a heartbeat sent by a flight controller (not a GCS or companion)
pub fn is_autopilot_heartbeat(msg: &MavMessage) -> bool {
    matches!(msg, MavMessage::HEARTBEAT(hb) if is_autopilot(hb))
}

/// True when every enabled onboard sensor reports healthy
pub fn sensors_healthy(status: &SYS_STATUS_DATA) -> bool {
    status
        .onboard_control_sensors_health
        .contains(status.onboard_control_sensors_enabled)
}

fn is_autopilot(hb: &HEARTBEAT_DATA) -> bool {
    hb.autopilot != MavAutopilot::MAV_AUTOPILOT_INVALID
}

fn mode_arm_update(hb: &HEARTBEAT_DATA) -> TelemetryUpdate {
    let flight_mode = match hb.autopilot {
        MavAutopilot::MAV_AUTOPILOT_PX4 => px4_flight_mode(hb.custom_mode),
        MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA if is_multirotor(hb.mavtype) => {
            ardupilot_copter_flight_mode(hb.custom_mode)
        }
        _ => UNKNOWN_FLIGHT_MODE,
    };

    TelemetryUpdate::ModeArm {
        flight_mode: Some(flight_mode.to_string()),
        armed: Some(hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED)),
    }
}

/// Human-readable name of a PX4 custom mode
pub fn px4_flight_mode(custom_mode: u32) -> &'static str {
    let main_mode = ((custom_mode >> 16) & 0xFF) as u8;
    let sub_mode = ((custom_mode >> 24) & 0xFF) as u8;

    match main_mode {
        PX4_MAIN_MANUAL => "Manual",
        PX4_MAIN_ALTCTL => "Altitude Control",
        PX4_MAIN_POSCTL => "Position Control",
        PX4_MAIN_ACRO => "Acro",
        PX4_MAIN_OFFBOARD => "Offboard",
        PX4_MAIN_STABILIZED => "Stabilized",
        PX4_MAIN_RATTITUDE => "Rattitude",
        PX4_MAIN_AUTO => match sub_mode {
            PX4_AUTO_READY => "Ready",
            PX4_AUTO_TAKEOFF => "Takeoff",
            PX4_AUTO_LOITER => "Hold",
            PX4_AUTO_MISSION => "Mission",
            PX4_AUTO_RTL => "Return to Launch",
            PX4_AUTO_LAND | PX4_AUTO_PRECLAND => "Land",
            PX4_AUTO_FOLLOW_TARGET => "Follow Me",
            _ => UNKNOWN_FLIGHT_MODE,
        },
        _ => UNKNOWN_FLIGHT_MODE,
    }
}

/// ArduCopter mode number mapped onto the PX4 display names
pub fn ardupilot_copter_flight_mode(custom_mode: u32) -> &'static str {
    match custom_mode {
        COPTER_STABILIZE => "Stabilized",
        COPTER_ACRO => "Acro",
        COPTER_ALT_HOLD => "Altitude Control",
        COPTER_AUTO => "Mission",
        COPTER_GUIDED => "Offboard",
        COPTER_LOITER | COPTER_BRAKE => "Hold",
        COPTER_RTL | COPTER_SMART_RTL | COPTER_AUTO_RTL => "Return to Launch",
        COPTER_LAND => "Land",
        COPTER_POSHOLD => "Position Control",
        COPTER_FOLLOW => "Follow Me",
        _ => UNKNOWN_FLIGHT_MODE,
    }
}

// ArduPlane and ArduRover number their modes differently
fn is_multirotor(mavtype: MavType) -> bool {
    matches!(
        mavtype,
        MavType::MAV_TYPE_QUADROTOR
            | MavType::MAV_TYPE_HEXAROTOR
            | MavType::MAV_TYPE_OCTOROTOR
            | MavType::MAV_TYPE_TRICOPTER
            | MavType::MAV_TYPE_HELICOPTER
            | MavType::MAV_TYPE_COAXIAL
    )
}

fn position_update(lat_e7: i32, lon_e7: i32, alt_mm: i32, relative_alt_mm: i32) -> TelemetryUpdate {
    TelemetryUpdate::Position {
        latitude: lat_e7 as f64 / 1e7,
        longitude: lon_e7 as f64 / 1e7,
        altitude_msl: alt_mm as f32 / 1000.0,
        altitude_rel: relative_alt_mm as f32 / 1000.0,
    }
}

fn attitude_update(roll_rad: f32, pitch_rad: f32, yaw_rad: f32) -> TelemetryUpdate {
    TelemetryUpdate::Attitude {
        roll: roll_rad.to_degrees(),
        pitch: pitch_rad.to_degrees(),
        yaw: yaw_rad.to_degrees(),
    }
}

/// Invalid sentinels (`u16::MAX` mV, `-1` cA, `-1` %) read as zero
fn power_update(voltage_mv: u16, current_ca: i16, remaining_pct: i8) -> TelemetryUpdate {
    let voltage = if voltage_mv == u16::MAX { 0.0 } else { voltage_mv as f32 / 1000.0 };
    let current = if current_ca == -1 { 0.0 } else { current_ca as f32 / 100.0 };
    let remaining = if (0..=100).contains(&remaining_pct) { remaining_pct as f32 } else { 0.0 };

    TelemetryUpdate::Power { voltage, current, remaining }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::{MavState, ATTITUDE_DATA, GLOBAL_POSITION_INT_DATA, PING_DATA};

    fn px4_mode(main: u8, sub: u8) -> u32 {
        ((sub as u32) << 24) | ((main as u32) << 16)
    }

    fn heartbeat(autopilot: MavAutopilot, custom_mode: u32, base_mode: MavModeFlag) -> HEARTBEAT_DATA {
        HEARTBEAT_DATA {
            custom_mode,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            autopilot,
            base_mode,
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        }
    }

    #[test]
    fn test_position_scaling() {
        let update = position_update(473_977_420, 85_455_940, 488_000, 10_500);
        match update {
            TelemetryUpdate::Position { latitude, longitude, altitude_msl, altitude_rel } => {
                assert!((latitude - 47.397742).abs() < 1e-9);
                assert!((longitude - 8.545594).abs() < 1e-9);
                assert_eq!(altitude_msl, 488.0);
                assert_eq!(altitude_rel, 10.5);
            }
            other => panic!("Expected Position, got {:?}", other),
        }
    }

    #[test]
    fn test_attitude_in_degrees() {
        let update = attitude_update(std::f32::consts::FRAC_PI_2, 0.0, -std::f32::consts::PI);
        match update {
            TelemetryUpdate::Attitude { roll, pitch, yaw } => {
                assert!((roll - 90.0).abs() < 1e-4);
                assert_eq!(pitch, 0.0);
                assert!((yaw + 180.0).abs() < 1e-4);
            }
            other => panic!("Expected Attitude, got {:?}", other),
        }
    }

    #[test]
    fn test_power_scaling() {
        assert_eq!(
            power_update(12_600, 1_520, 87),
            TelemetryUpdate::Power { voltage: 12.6, current: 15.2, remaining: 87.0 }
        );
    }

    #[test]
    fn test_power_invalid_sentinels_read_as_zero() {
        assert_eq!(
            power_update(u16::MAX, -1, -1),
            TelemetryUpdate::Power { voltage: 0.0, current: 0.0, remaining: 0.0 }
        );
    }

    #[test]
    fn test_px4_main_modes() {
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_MANUAL, 0)), "Manual");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_ALTCTL, 0)), "Altitude Control");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_POSCTL, 0)), "Position Control");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_ACRO, 0)), "Acro");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_OFFBOARD, 0)), "Offboard");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_STABILIZED, 0)), "Stabilized");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_RATTITUDE, 0)), "Rattitude");
    }

    #[test]
    fn test_px4_auto_sub_modes() {
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, PX4_AUTO_READY)), "Ready");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, PX4_AUTO_TAKEOFF)), "Takeoff");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, PX4_AUTO_LOITER)), "Hold");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, PX4_AUTO_MISSION)), "Mission");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, PX4_AUTO_RTL)), "Return to Launch");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, PX4_AUTO_LAND)), "Land");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, PX4_AUTO_PRECLAND)), "Land");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, PX4_AUTO_FOLLOW_TARGET)), "Follow Me");
    }

    #[test]
    fn test_px4_unknown_modes() {
        assert_eq!(px4_flight_mode(0), "Unknown");
        assert_eq!(px4_flight_mode(px4_mode(42, 0)), "Unknown");
        assert_eq!(px4_flight_mode(px4_mode(PX4_MAIN_AUTO, 77)), "Unknown");
    }

    #[test]
    fn test_px4_heartbeat_decodes_mode_and_armed() {
        let hb = heartbeat(
            MavAutopilot::MAV_AUTOPILOT_PX4,
            px4_mode(PX4_MAIN_AUTO, PX4_AUTO_MISSION),
            MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED | MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
        );
        let msg = MavMessage::HEARTBEAT(hb);

        assert!(is_autopilot_heartbeat(&msg));
        assert_eq!(
            decode(&msg),
            Some(TelemetryUpdate::ModeArm {
                flight_mode: Some("Mission".to_string()),
                armed: Some(true),
            })
        );
    }

    #[test]
    fn test_ardupilot_copter_modes() {
        assert_eq!(ardupilot_copter_flight_mode(COPTER_STABILIZE), "Stabilized");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_ALT_HOLD), "Altitude Control");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_AUTO), "Mission");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_GUIDED), "Offboard");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_LOITER), "Hold");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_BRAKE), "Hold");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_RTL), "Return to Launch");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_SMART_RTL), "Return to Launch");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_LAND), "Land");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_POSHOLD), "Position Control");
        assert_eq!(ardupilot_copter_flight_mode(COPTER_FOLLOW), "Follow Me");
        // Drift has no display name
        assert_eq!(ardupilot_copter_flight_mode(11), "Unknown");
    }

    #[test]
    fn test_ardupilot_copter_heartbeat_decodes_mode() {
        let hb = heartbeat(
            MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            COPTER_LOITER,
            MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED,
        );

        assert_eq!(
            decode(&MavMessage::HEARTBEAT(hb)),
            Some(TelemetryUpdate::ModeArm {
                flight_mode: Some("Hold".to_string()),
                armed: Some(true),
            })
        );
    }

    #[test]
    fn test_ardupilot_plane_mode_is_unknown() {
        let hb = HEARTBEAT_DATA {
            mavtype: MavType::MAV_TYPE_FIXED_WING,
            ..heartbeat(MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA, COPTER_LOITER, MavModeFlag::empty())
        };

        assert_eq!(
            decode(&MavMessage::HEARTBEAT(hb)),
            Some(TelemetryUpdate::ModeArm {
                flight_mode: Some("Unknown".to_string()),
                armed: Some(false),
            })
        );
    }

    #[test]
    fn test_other_autopilot_mode_is_unknown() {
        let hb = heartbeat(
            MavAutopilot::MAV_AUTOPILOT_GENERIC,
            px4_mode(PX4_MAIN_AUTO, PX4_AUTO_MISSION),
            MavModeFlag::empty(),
        );

        assert_eq!(
            decode(&MavMessage::HEARTBEAT(hb)),
            Some(TelemetryUpdate::ModeArm {
                flight_mode: Some("Unknown".to_string()),
                armed: Some(false),
            })
        );
    }

    #[test]
    fn test_gcs_heartbeat_is_ignored() {
        let hb = heartbeat(MavAutopilot::MAV_AUTOPILOT_INVALID, 0, MavModeFlag::empty());
        let msg = MavMessage::HEARTBEAT(hb);

        assert!(!is_autopilot_heartbeat(&msg));
        assert_eq!(decode(&msg), None);
    }

    #[test]
    fn test_decode_global_position_int() {
        let msg = MavMessage::GLOBAL_POSITION_INT(GLOBAL_POSITION_INT_DATA {
            lat: 473_977_420,
            lon: 85_455_940,
            alt: 488_000,
            relative_alt: 10_500,
            time_boot_ms: 0,
            vx: 0,
            vy: 0,
            vz: 0,
            hdg: u16::MAX,
        });
        assert_eq!(decode(&msg), Some(position_update(473_977_420, 85_455_940, 488_000, 10_500)));
    }

    #[test]
    fn test_decode_attitude() {
        let msg = MavMessage::ATTITUDE(ATTITUDE_DATA {
            roll: 0.1,
            pitch: -0.2,
            yaw: 1.0,
            time_boot_ms: 0,
            rollspeed: 0.0,
            pitchspeed: 0.0,
            yawspeed: 0.0,
        });
        assert_eq!(decode(&msg), Some(attitude_update(0.1, -0.2, 1.0)));
    }

    #[test]
    fn test_unrelated_message_decodes_to_nothing() {
        assert_eq!(decode(&MavMessage::PING(PING_DATA {
            time_usec: 0,
            seq: 0,
            target_system: 0,
            target_component: 0,
        })), None);
    }
}
