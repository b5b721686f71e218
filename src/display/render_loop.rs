//! # Render Loop
//!
//! Redraws the latest published snapshot on a fixed tick and watches for the
//! quit key.
//!
//! State machine: `Idle → Running → Stopping → Stopped`.
//!
//! Each tick reads the snapshot with a non-blocking `watch` borrow, so the
//! loop never waits on the aggregator and a quiet tick simply redraws the
//! same data. The task owns the surface, which is restored exactly once when
//! the task ends, whichever of the quit key or [`RenderLoop::stop`] ended it.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::layout;
use super::surface::{KeyPress, Surface};
use crate::config::DisplayConfig;
use crate::error::{DashboardError, Result};
use crate::telemetry::TelemetrySnapshot;

/// Render loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Fixed-rate renderer over a [`Surface`]
pub struct RenderLoop<S: Surface> {
    /// Held until `start` hands it to the task
    surface: Option<S>,
    snapshots: watch::Receiver<TelemetrySnapshot>,
    tick: Duration,
    refresh_hz: u32,
    state: Arc<watch::Sender<RenderState>>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl<S: Surface> std::fmt::Debug for RenderLoop<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("state", &self.state())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<S: Surface> RenderLoop<S> {
    pub fn new(
        surface: S,
        snapshots: watch::Receiver<TelemetrySnapshot>,
        display: &DisplayConfig,
    ) -> Self {
        let (state, _) = watch::channel(RenderState::Idle);
        let (stop_tx, _) = watch::channel(false);
        Self {
            surface: Some(surface),
            snapshots,
            tick: display.tick(),
            refresh_hz: display.refresh_hz,
            state: Arc::new(state),
            stop_tx,
            task: None,
        }
    }

    pub fn state(&self) -> RenderState {
        *self.state.borrow()
    }

    /// Initialize the surface and spawn the periodic render task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::SurfaceInit`] if the surface cannot be
    /// initialized. A restore is attempted first and the loop stays `Idle`.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != RenderState::Idle {
            return Err(DashboardError::Render("render loop already started".to_string()));
        }
        let mut surface = self
            .surface
            .take()
            .ok_or_else(|| DashboardError::Render("render surface missing".to_string()))?;

        if let Err(e) = surface.init() {
            if let Err(restore_err) = surface.restore() {
                warn!("Failed to restore surface after init error: {}", restore_err);
            }
            self.surface = Some(surface);
            return Err(match e {
                DashboardError::SurfaceInit(_) => e,
                other => DashboardError::SurfaceInit(other.to_string()),
            });
        }

        self.state.send_replace(RenderState::Running);
        let stop_rx = self.stop_tx.subscribe();
        self.task = Some(tokio::spawn(run(
            surface,
            self.snapshots.clone(),
            self.tick,
            self.refresh_hz,
            Arc::clone(&self.state),
            stop_rx,
        )));

        debug!("Render loop started ({:?} tick)", self.tick);
        Ok(())
    }

    /// Stop the render task and wait for it to restore the surface.
    ///
    /// Safe to call any number of times, before or after the quit key.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        if self.state() == RenderState::Running {
            self.state.send_replace(RenderState::Stopping);
        }
        self.stop_tx.send_replace(true);

        task.await
            .map_err(|e| DashboardError::Render(format!("render task failed: {}", e)))?;
        debug!("Render loop stopped");
        Ok(())
    }

    /// Resolves once the loop is stopping, for whatever reason.
    ///
    /// The returned future does not borrow the loop, so it can be raced
    /// against a shutdown signal while `stop` is still reachable.
    pub fn quit_requested(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut state = self.state.subscribe();
        async move {
            loop {
                if matches!(
                    *state.borrow_and_update(),
                    RenderState::Stopping | RenderState::Stopped
                ) {
                    return;
                }
                if state.changed().await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn run<S: Surface>(
    mut surface: S,
    snapshots: watch::Receiver<TelemetrySnapshot>,
    tick: Duration,
    refresh_hz: u32,
    state: Arc<watch::Sender<RenderState>>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                let snapshot = snapshots.borrow().clone();
                if let Err(e) = draw_frame(&mut surface, &snapshot, refresh_hz) {
                    warn!("Failed to draw frame: {}", e);
                }

                match surface.poll_key() {
                    Ok(Some(key)) if is_quit_key(key) => {
                        info!("Quit requested from keyboard");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to poll keyboard: {}", e),
                }
            }
        }
    }

    state.send_replace(RenderState::Stopping);
    if let Err(e) = surface.restore() {
        warn!("Failed to restore terminal: {}", e);
    }
    state.send_replace(RenderState::Stopped);
}

/// Clear, draw and flush one full frame
fn draw_frame<S: Surface>(
    surface: &mut S,
    snapshot: &TelemetrySnapshot,
    refresh_hz: u32,
) -> io::Result<()> {
    surface.clear()?;
    for line in layout::frame(snapshot, surface.rows(), refresh_hz) {
        surface.draw_text(line.row, line.col, &line.text, line.style)?;
    }
    surface.flush()
}

fn is_quit_key(key: KeyPress) -> bool {
    matches!(key, KeyPress::Char('q') | KeyPress::Char('Q') | KeyPress::Interrupt)
}
