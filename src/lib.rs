//! # Drone Dashboard Library
//!
//! Live telemetry dashboard for MAVLink vehicles, drawn in the terminal.
//!
//! A [`source::TelemetrySource`] delivers field-group updates from its own
//! threads into a [`telemetry::TelemetryAggregator`], which keeps one
//! consistent snapshot and publishes copies. The [`display::RenderLoop`]
//! redraws the latest copy at a fixed rate, and [`dashboard::Dashboard`]
//! sequences startup and shutdown of the whole pipeline.

pub mod config;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod source;
pub mod telemetry;
