//! Fixed dashboard layout.
//!
//! Turns a snapshot into positioned, styled lines. Drawing them is the render
//! loop's job; keeping layout pure makes the exact frame testable.

use super::surface::{TextStyle, Tone};
use crate::telemetry::TelemetrySnapshot;

pub const TITLE: &str = "=== DRONE TELEMETRY DASHBOARD ===";

/// Column of the title, status and section headers
const HEADER_COL: u16 = 2;
/// Column of the values within a section
const FIELD_COL: u16 = 4;
/// Row of the title
const FIRST_ROW: u16 = 1;

/// One piece of text at a fixed position
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub row: u16,
    pub col: u16,
    pub text: String,
    pub style: TextStyle,
}

struct FrameBuilder {
    lines: Vec<Line>,
    row: u16,
}

impl FrameBuilder {
    fn new() -> Self {
        Self { lines: Vec::with_capacity(32), row: FIRST_ROW }
    }

    fn put(&mut self, col: u16, text: String, style: TextStyle) {
        self.lines.push(Line { row: self.row, col, text, style });
        self.row += 1;
    }

    fn header(&mut self, text: &str) {
        self.put(HEADER_COL, text.to_string(), TextStyle::tone(Tone::Header));
    }

    fn field(&mut self, text: String) {
        self.put(FIELD_COL, text, TextStyle::PLAIN);
    }

    fn gap(&mut self) {
        self.row += 1;
    }
}

/// Lay out one full frame for a terminal `rows` tall
pub fn frame(snapshot: &TelemetrySnapshot, rows: u16, refresh_hz: u32) -> Vec<Line> {
    let s = snapshot;
    let mut f = FrameBuilder::new();

    f.put(HEADER_COL, TITLE.to_string(), TextStyle::tone(Tone::Header).bold());
    f.gap();

    if s.connected {
        f.put(HEADER_COL, "Status: CONNECTED".to_string(), TextStyle::tone(Tone::Affirmative));
    } else {
        f.put(HEADER_COL, "Status: DISCONNECTED".to_string(), TextStyle::tone(Tone::Negative));
    }
    f.gap();

    f.header("FLIGHT STATUS:");
    f.field(format!("Mode: {}", s.flight_mode));
    f.field(format!("Armed: {}", if s.armed { "YES" } else { "NO" }));
    f.gap();

    f.header("POSITION:");
    f.field(format!("Latitude:  {:.6}°", s.latitude));
    f.field(format!("Longitude: {:.6}°", s.longitude));
    f.field(format!("Alt (MSL): {:.2} m", s.altitude_msl));
    f.field(format!("Alt (REL): {:.2} m", s.altitude_rel));
    f.gap();

    f.header("ATTITUDE:");
    f.field(format!("Roll:  {:.2}°", s.roll));
    f.field(format!("Pitch: {:.2}°", s.pitch));
    f.field(format!("Yaw:   {:.2}°", s.yaw));
    f.gap();

    f.header("VELOCITY (NED):");
    f.field(format!("North: {:.2} m/s", s.velocity_north));
    f.field(format!("East:  {:.2} m/s", s.velocity_east));
    f.field(format!("Down:  {:.2} m/s", s.velocity_down));
    f.gap();

    f.header("BATTERY:");
    f.field(format!("Voltage:   {:.2} V", s.battery_voltage));
    f.field(format!("Current:   {:.2} A", s.battery_current));
    f.field(format!("Remaining: {:.2}%", s.battery_remaining));
    f.gap();

    f.header("GPS:");
    f.field(format!("Satellites: {}", s.gps_satellites));
    f.field(format!("Fix Type:   {}", s.gps_fix_type));

    let mut lines = f.lines;
    lines.push(Line {
        row: rows.saturating_sub(1),
        col: HEADER_COL,
        text: status_hint(refresh_hz),
        style: TextStyle::tone(Tone::Caution),
    });
    lines
}

/// Bottom status line
pub fn status_hint(refresh_hz: u32) -> String {
    format!("Press 'q' to quit | Update rate: {}Hz", refresh_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_at(lines: &[Line], row: u16) -> &str {
        lines
            .iter()
            .find(|line| line.row == row)
            .map(|line| line.text.as_str())
            .unwrap_or("")
    }

    fn sample() -> TelemetrySnapshot {
        TelemetrySnapshot {
            latitude: 47.397742,
            longitude: 8.545594,
            altitude_msl: 488.0,
            altitude_rel: 10.5,
            roll: 1.234,
            pitch: -2.5,
            yaw: 179.999,
            velocity_north: 0.5,
            velocity_east: -0.25,
            velocity_down: 0.0,
            battery_voltage: 12.6,
            battery_current: 15.25,
            battery_remaining: 87.0,
            gps_satellites: 12,
            gps_fix_type: 3,
            flight_mode: "Mission".to_string(),
            armed: true,
            connected: true,
            timestamp_ms: 1,
            sequence: 1,
        }
    }

    #[test]
    fn test_fixed_rows() {
        let lines = frame(&sample(), 40, 10);

        assert_eq!(text_at(&lines, 1), TITLE);
        assert_eq!(text_at(&lines, 3), "Status: CONNECTED");
        assert_eq!(text_at(&lines, 5), "FLIGHT STATUS:");
        assert_eq!(text_at(&lines, 6), "Mode: Mission");
        assert_eq!(text_at(&lines, 7), "Armed: YES");
        assert_eq!(text_at(&lines, 9), "POSITION:");
        assert_eq!(text_at(&lines, 10), "Latitude:  47.397742°");
        assert_eq!(text_at(&lines, 11), "Longitude: 8.545594°");
        assert_eq!(text_at(&lines, 12), "Alt (MSL): 488.00 m");
        assert_eq!(text_at(&lines, 13), "Alt (REL): 10.50 m");
        assert_eq!(text_at(&lines, 15), "ATTITUDE:");
        assert_eq!(text_at(&lines, 16), "Roll:  1.23°");
        assert_eq!(text_at(&lines, 17), "Pitch: -2.50°");
        assert_eq!(text_at(&lines, 18), "Yaw:   180.00°");
        assert_eq!(text_at(&lines, 20), "VELOCITY (NED):");
        assert_eq!(text_at(&lines, 21), "North: 0.50 m/s");
        assert_eq!(text_at(&lines, 22), "East:  -0.25 m/s");
        assert_eq!(text_at(&lines, 23), "Down:  0.00 m/s");
        assert_eq!(text_at(&lines, 25), "BATTERY:");
        assert_eq!(text_at(&lines, 26), "Voltage:   12.60 V");
        assert_eq!(text_at(&lines, 27), "Current:   15.25 A");
        assert_eq!(text_at(&lines, 28), "Remaining: 87.00%");
        assert_eq!(text_at(&lines, 30), "GPS:");
        assert_eq!(text_at(&lines, 31), "Satellites: 12");
        assert_eq!(text_at(&lines, 32), "Fix Type:   3");
        assert_eq!(text_at(&lines, 39), "Press 'q' to quit | Update rate: 10Hz");
    }

    #[test]
    fn test_blank_separator_rows() {
        let lines = frame(&sample(), 40, 10);
        for row in [2, 4, 8, 14, 19, 24, 29] {
            assert_eq!(text_at(&lines, row), "", "row {} should be empty", row);
        }
    }

    #[test]
    fn test_columns() {
        let lines = frame(&sample(), 40, 10);
        for line in &lines {
            let expected = if line.style == TextStyle::PLAIN { 4 } else { 2 };
            assert_eq!(line.col, expected, "unexpected column for {:?}", line.text);
        }
    }

    #[test]
    fn test_styles() {
        let lines = frame(&sample(), 40, 10);
        let style_of = |row: u16| lines.iter().find(|l| l.row == row).map(|l| l.style);

        assert_eq!(style_of(1), Some(TextStyle::tone(Tone::Header).bold()));
        assert_eq!(style_of(3), Some(TextStyle::tone(Tone::Affirmative)));
        assert_eq!(style_of(9), Some(TextStyle::tone(Tone::Header)));
        assert_eq!(style_of(10), Some(TextStyle::PLAIN));
        assert_eq!(style_of(39), Some(TextStyle::tone(Tone::Caution)));
    }

    #[test]
    fn test_disconnected_is_visually_distinct() {
        let snapshot = TelemetrySnapshot { connected: false, ..sample() };
        let lines = frame(&snapshot, 40, 10);
        let status = lines.iter().find(|l| l.row == 3).unwrap();

        assert_eq!(status.text, "Status: DISCONNECTED");
        assert_eq!(status.style, TextStyle::tone(Tone::Negative));
        // Last known values stay on screen
        assert_eq!(text_at(&lines, 10), "Latitude:  47.397742°");
    }

    #[test]
    fn test_default_snapshot_frame() {
        let lines = frame(&TelemetrySnapshot::default(), 40, 10);
        assert_eq!(text_at(&lines, 6), "Mode: Unknown");
        assert_eq!(text_at(&lines, 7), "Armed: NO");
        assert_eq!(text_at(&lines, 10), "Latitude:  0.000000°");
        assert_eq!(text_at(&lines, 31), "Satellites: 0");
    }

    #[test]
    fn test_status_line_follows_terminal_height() {
        let lines = frame(&sample(), 50, 20);
        let last = lines.last().unwrap();
        assert_eq!(last.row, 49);
        assert_eq!(last.text, "Press 'q' to quit | Update rate: 20Hz");
    }

    #[test]
    fn test_tiny_terminal_does_not_underflow() {
        let lines = frame(&sample(), 0, 10);
        assert_eq!(lines.last().unwrap().row, 0);
    }
}
