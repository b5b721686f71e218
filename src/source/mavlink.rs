//! # MAVLink Telemetry Source
//!
//! Connects to an autopilot over UDP, TCP or serial using the `mavlink` crate.
//!
//! Two threads run per connection:
//! - the reader, which blocks on `recv`, decodes messages and applies updates
//! - the heartbeat thread, which announces this monitor as a ground station
//!   and flips the connected flag when autopilot heartbeats stop or resume
//!
//! The source binds to the system id of the first autopilot heartbeat it
//! sees. Traffic from every other system on the link is ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mavlink::common::{
    MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA,
};
use mavlink::{MavConnection, MavHeader};
use tracing::{debug, info, warn};

use super::address::normalize_address;
use super::decode::{decode, is_autopilot_heartbeat, sensors_healthy};
use super::TelemetrySource;
use crate::config::ConnectionConfig;
use crate::error::{DashboardError, Result};
use crate::telemetry::TelemetryAggregator;

/// System id used by ground control stations
const GCS_SYSTEM_ID: u8 = 255;

/// MAV_COMP_ID_MISSIONPLANNER
const GCS_COMPONENT_ID: u8 = 190;

/// Pause after a failed read so a dead link does not spin
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Granularity at which the heartbeat thread notices `disconnect`
const HEARTBEAT_POLL: Duration = Duration::from_millis(50);

/// How long shutdown waits for the reader to leave `recv`
const READER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

type SharedConnection = Arc<dyn MavConnection<MavMessage> + Send + Sync>;
type LastHeartbeat = Arc<Mutex<Option<Instant>>>;

/// Handshake progress reported by the reader thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkEvent {
    Heartbeat,
    Healthy,
}

struct Link {
    running: Arc<AtomicBool>,
    heartbeat_thread: Option<JoinHandle<()>>,
    reader_thread: Option<JoinHandle<()>>,
    /// Loopback address that reaches the reader's bound socket
    wake: Option<String>,
    aggregator: Arc<TelemetryAggregator>,
}

impl Link {
    fn shut_down(mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.heartbeat_thread.take() {
            if handle.join().is_err() {
                warn!("MAVLink heartbeat thread panicked");
            }
        }

        if let Some(handle) = self.reader_thread.take() {
            stop_reader(handle, self.wake.as_deref());
        }
    }
}

/// Unblock the reader's `recv` and wait for it, so its end of the
/// connection is released.
///
/// `running` must already be cleared.
fn stop_reader(handle: JoinHandle<()>, wake: Option<&str>) {
    if let Some(address) = wake {
        wake_reader(address);
    }

    let deadline = Instant::now() + READER_JOIN_TIMEOUT;
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    if handle.is_finished() {
        if handle.join().is_err() {
            warn!("MAVLink reader thread panicked");
        }
    } else {
        // Still parked in recv; it exits on the next message
        warn!("MAVLink reader did not stop in {:?}, detaching", READER_JOIN_TIMEOUT);
    }
}

/// Send one GCS heartbeat to the reader's own socket
fn wake_reader(address: &str) {
    let header = MavHeader {
        system_id: GCS_SYSTEM_ID,
        component_id: GCS_COMPONENT_ID,
        sequence: 0,
    };
    match mavlink::connect::<MavMessage>(address) {
        Ok(conn) => {
            if let Err(e) = conn.send(&header, &gcs_heartbeat()) {
                debug!("Failed to wake MAVLink reader: {:?}", e);
            }
        }
        Err(e) => debug!("Failed to open wake link {}: {}", address, e),
    }
}

/// Loopback address reaching a `udpin:` listener.
///
/// Other connection kinds either have no fixed local port or are woken by
/// the peer's own traffic.
fn wake_address(url: &str) -> Option<String> {
    let (host, port) = url.strip_prefix("udpin:")?.rsplit_once(':')?;
    let host = match host {
        "" | "0.0.0.0" => "127.0.0.1",
        host => host,
    };
    Some(format!("udpout:{}:{}", host, port))
}

/// MAVLink implementation of [`TelemetrySource`]
pub struct MavlinkSource {
    settings: ConnectionConfig,
    link: Option<Link>,
}

impl std::fmt::Debug for MavlinkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MavlinkSource")
            .field("settings", &self.settings)
            .field("connected", &self.link.is_some())
            .finish_non_exhaustive()
    }
}

impl MavlinkSource {
    /// Create a disconnected source
    pub fn new(settings: ConnectionConfig) -> Self {
        Self { settings, link: None }
    }

    /// True between a successful `connect` and `disconnect`
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Wait for the autopilot heartbeat (and sensor health when required)
    fn await_handshake(&self, events: &mpsc::Receiver<LinkEvent>, address: &str) -> Result<()> {
        let deadline = Instant::now() + self.settings.timeout();
        let mut heartbeat = false;
        let mut healthy = !self.settings.require_healthy;

        while !(heartbeat && healthy) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match events.recv_timeout(remaining) {
                Ok(LinkEvent::Heartbeat) => {
                    info!("Autopilot heartbeat received");
                    heartbeat = true;
                }
                Ok(LinkEvent::Healthy) => {
                    if !healthy {
                        info!("Autopilot sensors healthy");
                    }
                    healthy = true;
                }
                Err(_) => {
                    return Err(DashboardError::ConnectionTimeout {
                        address: address.to_string(),
                        timeout_secs: self.settings.timeout_secs,
                    });
                }
            }

            if heartbeat && !healthy {
                debug!("Waiting for system to be ready...");
            }
        }

        Ok(())
    }
}

impl TelemetrySource for MavlinkSource {
    fn connect(&mut self, address: &str, aggregator: Arc<TelemetryAggregator>) -> Result<()> {
        if self.link.is_some() {
            return Err(DashboardError::Connection("already connected".to_string()));
        }

        let url = normalize_address(address)?;
        info!("Opening MAVLink connection on {}", url);

        let conn: SharedConnection = Arc::from(
            mavlink::connect::<MavMessage>(&url)
                .map_err(|e| DashboardError::Connection(format!("{}: {}", url, e)))?,
        );

        let running = Arc::new(AtomicBool::new(true));
        let delivering = Arc::new(AtomicBool::new(false));
        let last_heartbeat: LastHeartbeat = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = mpsc::channel();
        let wake = wake_address(&url);

        let reader_thread = {
            let reader = Reader {
                conn: conn.clone(),
                running: running.clone(),
                dispatch: Dispatch::new(
                    aggregator.clone(),
                    delivering.clone(),
                    last_heartbeat.clone(),
                    events_tx,
                ),
            };
            thread::Builder::new()
                .name("mavlink-reader".to_string())
                .spawn(move || reader.run())?
        };

        if let Err(e) = self.await_handshake(&events_rx, &url) {
            running.store(false, Ordering::SeqCst);
            stop_reader(reader_thread, wake.as_deref());
            warn!("{}", e);
            return Err(e);
        }

        delivering.store(true, Ordering::SeqCst);
        aggregator.set_connected(true);

        let heartbeat_thread = {
            let heartbeat = Heartbeat {
                conn,
                aggregator: aggregator.clone(),
                running: running.clone(),
                last_heartbeat,
                period: self.settings.gcs_heartbeat_period(),
                link_timeout: self.settings.heartbeat_timeout(),
            };
            thread::Builder::new()
                .name("mavlink-heartbeat".to_string())
                .spawn(move || heartbeat.run())
        };

        let heartbeat_thread = match heartbeat_thread {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                stop_reader(reader_thread, wake.as_deref());
                aggregator.set_connected(false);
                return Err(e.into());
            }
        };

        self.link = Some(Link {
            running,
            heartbeat_thread: Some(heartbeat_thread),
            reader_thread: Some(reader_thread),
            wake,
            aggregator,
        });

        info!("Connected to system on {}", url);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            let aggregator = link.aggregator.clone();
            link.shut_down();
            aggregator.set_connected(false);
            info!("Disconnected from autopilot");
        }
    }
}

impl Drop for MavlinkSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct Reader {
    conn: SharedConnection,
    running: Arc<AtomicBool>,
    dispatch: Dispatch,
}

impl Reader {
    fn run(mut self) {
        while self.running.load(Ordering::SeqCst) {
            let (header, msg) = match self.conn.recv() {
                Ok(received) => received,
                Err(e) => {
                    debug!("MAVLink read error: {:?}", e);
                    thread::sleep(READ_ERROR_BACKOFF);
                    continue;
                }
            };

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.dispatch.handle(&header, &msg);
        }

        debug!("MAVLink reader stopped");
    }
}

/// Routes messages from the bound vehicle into the aggregator
struct Dispatch {
    aggregator: Arc<TelemetryAggregator>,
    delivering: Arc<AtomicBool>,
    last_heartbeat: LastHeartbeat,
    events: mpsc::Sender<LinkEvent>,
    /// System id of the first autopilot heard
    vehicle: Option<u8>,
    seen_healthy: bool,
}

impl Dispatch {
    fn new(
        aggregator: Arc<TelemetryAggregator>,
        delivering: Arc<AtomicBool>,
        last_heartbeat: LastHeartbeat,
        events: mpsc::Sender<LinkEvent>,
    ) -> Self {
        Self {
            aggregator,
            delivering,
            last_heartbeat,
            events,
            vehicle: None,
            seen_healthy: false,
        }
    }

    fn handle(&mut self, header: &MavHeader, msg: &MavMessage) {
        let autopilot_heartbeat = is_autopilot_heartbeat(msg);

        if self.vehicle.is_none() && autopilot_heartbeat {
            info!("Bound to autopilot system {}", header.system_id);
            self.vehicle = Some(header.system_id);
            let _ = self.events.send(LinkEvent::Heartbeat);
        }
        if self.vehicle != Some(header.system_id) {
            return;
        }

        if autopilot_heartbeat {
            *self.last_heartbeat.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        }

        if let MavMessage::SYS_STATUS(status) = msg {
            if !self.seen_healthy && sensors_healthy(status) {
                self.seen_healthy = true;
                let _ = self.events.send(LinkEvent::Healthy);
            }
        }

        if self.delivering.load(Ordering::SeqCst) {
            if let Some(update) = decode(msg) {
                self.aggregator.apply_update(update);
            }
        }
    }
}

struct Heartbeat {
    conn: SharedConnection,
    aggregator: Arc<TelemetryAggregator>,
    running: Arc<AtomicBool>,
    last_heartbeat: LastHeartbeat,
    period: Duration,
    link_timeout: Duration,
}

impl Heartbeat {
    fn run(self) {
        let mut header = MavHeader {
            system_id: GCS_SYSTEM_ID,
            component_id: GCS_COMPONENT_ID,
            sequence: 0,
        };
        let mut watchdog = LinkWatchdog::new(self.link_timeout);

        while self.running.load(Ordering::SeqCst) {
            header.sequence = header.sequence.wrapping_add(1);
            if let Err(e) = self.conn.send(&header, &gcs_heartbeat()) {
                debug!("Failed to send GCS heartbeat: {:?}", e);
            }

            let last = *self.last_heartbeat.lock().unwrap_or_else(PoisonError::into_inner);
            watchdog.check(last, Instant::now(), &self.aggregator);

            self.pause();
        }

        debug!("MAVLink heartbeat stopped");
    }

    /// Sleep one period, waking early when the link is shut down
    fn pause(&self) {
        let until = Instant::now() + self.period;
        while self.running.load(Ordering::SeqCst) {
            let remaining = until.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(HEARTBEAT_POLL));
        }
    }
}

/// Tracks autopilot heartbeat freshness and publishes link changes
struct LinkWatchdog {
    timeout: Duration,
    link_up: bool,
}

impl LinkWatchdog {
    /// Starts with the link up, as left by a successful handshake
    fn new(timeout: Duration) -> Self {
        Self { timeout, link_up: true }
    }

    /// Publish `connected` only when the link state flips
    fn check(&mut self, last: Option<Instant>, now: Instant, aggregator: &TelemetryAggregator) {
        let alive = link_alive(last, now, self.timeout);
        if alive == self.link_up {
            return;
        }

        self.link_up = alive;
        if alive {
            info!("Autopilot heartbeat restored");
        } else {
            warn!("Autopilot heartbeat lost");
        }
        aggregator.set_connected(alive);
    }
}

/// Heartbeat announcing this process as a ground control station
fn gcs_heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    })
}

/// True if the last autopilot heartbeat is younger than `timeout`
fn link_alive(last: Option<Instant>, now: Instant, timeout: Duration) -> bool {
    last.map_or(false, |at| now.saturating_duration_since(at) < timeout)
}
