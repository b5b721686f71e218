//! # Dashboard Lifecycle
//!
//! Wires the aggregator, telemetry source, render loop and optional recorder
//! together and sequences their startup and shutdown.
//!
//! Startup: aggregator → snapshot sink → source connect → render loop →
//! recorder. Shutdown: render loop → recorder → source disconnect. Shutdown
//! runs once; later calls return immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::display::{RenderLoop, Surface};
use crate::error::{DashboardError, Result};
use crate::source::TelemetrySource;
use crate::telemetry::recorder::{spawn_recorder, SnapshotRecorder};
use crate::telemetry::{SnapshotSink, TelemetryAggregator};

struct RecorderTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns every long-lived component of a dashboard session
pub struct Dashboard<T: TelemetrySource + 'static, S: Surface> {
    config: Config,
    aggregator: Arc<TelemetryAggregator>,
    sink: SnapshotSink,
    /// Taken while a blocking connect or disconnect runs
    source: Option<T>,
    render: RenderLoop<S>,
    recorder: Option<RecorderTask>,
    source_connected: bool,
    shut_down: bool,
}

impl<T: TelemetrySource + 'static, S: Surface> Dashboard<T, S> {
    /// Build the aggregator and hook its publish callback to the render loop
    /// before anything can emit.
    pub fn new(config: Config, source: T, surface: S) -> Self {
        let aggregator = Arc::new(TelemetryAggregator::new());
        let (sink, snapshots) = SnapshotSink::channel();
        aggregator.subscribe(sink.observer());
        let render = RenderLoop::new(surface, snapshots, &config.display);

        Self {
            config,
            aggregator,
            sink,
            source: Some(source),
            render,
            recorder: None,
            source_connected: false,
            shut_down: false,
        }
    }

    pub fn aggregator(&self) -> Arc<TelemetryAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Connect the source, then start rendering.
    ///
    /// # Errors
    ///
    /// - Connection failures are returned as-is and nothing is rendered.
    /// - A surface init failure disconnects the source before returning.
    pub async fn start(&mut self, address: &str) -> Result<()> {
        if self.shut_down {
            return Err(DashboardError::Render("dashboard already shut down".to_string()));
        }

        let aggregator = self.aggregator();
        let target = address.to_string();
        self.with_source(move |source| source.connect(&target, aggregator))
            .await??;
        self.source_connected = true;

        if let Err(e) = self.render.start() {
            warn!("Render loop failed to start: {}", e);
            self.disconnect_source().await;
            return Err(e);
        }

        if self.config.recording.enabled {
            self.start_recorder();
        }

        info!("Dashboard running");
        Ok(())
    }

    /// Run until `shutdown` resolves or the operator quits, then shut down.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let quit = self.render.quit_requested();
        tokio::select! {
            _ = shutdown => info!("Shutdown signal received"),
            _ = quit => info!("Quit requested"),
        }
        self.shutdown().await
    }

    /// Stop rendering, stop recording, then disconnect the source.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            debug!("Shutdown already done");
            return Ok(());
        }
        self.shut_down = true;
        info!("Shutting down...");

        let rendered = self.render.stop().await;

        if let Some(recorder) = self.recorder.take() {
            recorder.stop.send_replace(true);
            if let Err(e) = recorder.handle.await {
                warn!("Recorder task failed: {}", e);
            }
        }

        self.disconnect_source().await;

        info!("Shutdown complete");
        rendered
    }

    fn start_recorder(&mut self) {
        let settings = &self.config.recording;
        match SnapshotRecorder::new(settings) {
            Ok(recorder) => {
                let (stop, stop_rx) = watch::channel(false);
                let handle = spawn_recorder(
                    recorder,
                    self.sink.receiver(),
                    Duration::from_millis(settings.interval_ms),
                    stop_rx,
                );
                self.recorder = Some(RecorderTask { stop, handle });
            }
            // Recording is optional; the dashboard keeps running without it
            Err(e) => warn!("Snapshot recording disabled: {}", e),
        }
    }

    async fn disconnect_source(&mut self) {
        if !self.source_connected {
            return;
        }
        self.source_connected = false;
        if let Err(e) = self.with_source(|source| source.disconnect()).await {
            warn!("Failed to disconnect telemetry source: {}", e);
        }
    }

    /// Run a blocking source operation off the async worker threads
    async fn with_source<R, F>(&mut self, op: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut source = self
            .source
            .take()
            .ok_or_else(|| DashboardError::Connection("telemetry source unavailable".to_string()))?;

        let (source, out) = tokio::task::spawn_blocking(move || {
            let out = op(&mut source);
            (source, out)
        })
        .await
        .map_err(|e| DashboardError::Connection(format!("telemetry source task failed: {}", e)))?;

        self.source = Some(source);
        Ok(out)
    }
}
