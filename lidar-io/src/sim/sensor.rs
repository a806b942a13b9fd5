//! One simulated rangefinder
//!
//! A sensor owns its pose, scan window, scan mode and ray caster behind a
//! single mutex. Connections register a [`Listener`]; the sensor keeps only
//! `Weak` handles, so a dropped connection disappears from the fan-out on the
//! next tick.

use super::environment::EnvironmentSnapshot;
use super::noise::NoiseGenerator;
use super::raycast::{LocalScene, RayCaster};
use crate::config::{SensorConfig, SimulationSettings};
use crate::error::{Error, Result};
use crate::protocol::command::{
    encode_ack, encode_scan_notification, encode_scan_window_reply, encode_write_ack,
};
use crate::protocol::constants::*;
use crate::protocol::fixed::{angle_to_fixed, hex_to_angle, mm_to_meters};
use crate::protocol::message::{ClassTag, Message};
use crate::queue::DropOldestQueue;
use crate::types::{ScanRecord, ScanWindow, SensorPose};
use crossbeam_channel::select;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Outbound frame shared between every listener of a tick
pub type Frame = Arc<[u8]>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Whether a sensor emits scans on each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Idle,
    Scanning,
}

/// Outbound side of one client connection
///
/// Scans and command replies are queued separately so a backlog of scans
/// never evicts a reply. Replies are written first.
pub struct Listener {
    id: u64,
    peer: String,
    outbound: DropOldestQueue<Frame>,
    replies: DropOldestQueue<Frame>,
}

impl Listener {
    pub fn new(peer: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            peer: peer.into(),
            outbound: DropOldestQueue::new(capacity),
            replies: DropOldestQueue::new(capacity),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Queue a frame, dropping the oldest pending one when full
    pub fn send(&self, frame: Frame) {
        if self.outbound.push(frame) {
            log::trace!("Listener {} queue full, dropped oldest frame", self.peer);
        }
    }

    /// Queue a command reply
    pub fn send_reply(&self, frame: Frame) {
        if self.replies.push(frame) {
            log::warn!("Listener {} reply queue full, dropped oldest reply", self.peer);
        }
    }

    /// Next frame to write, replies first, waiting up to `timeout`
    pub fn next_frame(&self, timeout: Duration) -> Option<Frame> {
        if let Some(frame) = self.replies.try_pop() {
            return Some(frame);
        }
        let replies = self.replies.receiver();
        let scans = self.outbound.receiver();
        select! {
            recv(replies) -> frame => frame.ok(),
            recv(scans) -> frame => frame.ok(),
            default(timeout) => None,
        }
    }

    /// Pending scan frames
    pub fn outbound(&self) -> &DropOldestQueue<Frame> {
        &self.outbound
    }

    /// Pending reply frames
    pub fn replies(&self) -> &DropOldestQueue<Frame> {
        &self.replies
    }
}

struct SensorState {
    pose: SensorPose,
    window: ScanWindow,
    mode: ScanMode,
    listeners: Vec<Weak<Listener>>,
    scan_counter: u32,
    ray_caster: RayCaster,
    last_scan: Option<ScanRecord>,
}

/// Simulated sensor registered under an id
pub struct SimulatedSensor {
    id: String,
    bind_address: String,
    scan_rate_hz: f32,
    started: Instant,
    state: Mutex<SensorState>,
}

impl SimulatedSensor {
    /// Create an idle sensor from its configuration
    pub fn new(config: &SensorConfig, settings: &SimulationSettings, seed: u64) -> Self {
        let ray_caster = RayCaster::new(
            NoiseGenerator::new(seed),
            settings.noise_amplitude,
            settings.max_range,
        );
        Self {
            id: config.id.clone(),
            bind_address: config.bind_address.clone(),
            scan_rate_hz: settings.tick_hz,
            started: Instant::now(),
            state: Mutex::new(SensorState {
                pose: config.pose,
                window: config.window,
                mode: ScanMode::Idle,
                listeners: Vec::new(),
                scan_counter: 0,
                ray_caster,
                last_scan: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn pose(&self) -> SensorPose {
        self.state.lock().pose
    }

    /// Move the sensor; takes effect on the next tick
    pub fn set_pose(&self, pose: SensorPose) {
        self.state.lock().pose = pose;
    }

    pub fn window(&self) -> ScanWindow {
        self.state.lock().window
    }

    /// Replace the scan window; an invalid window leaves the current one
    pub fn set_window(&self, window: ScanWindow) -> Result<()> {
        window.validate()?;
        self.state.lock().window = window;
        Ok(())
    }

    pub fn mode(&self) -> ScanMode {
        self.state.lock().mode
    }

    /// Most recent scan broadcast by this sensor
    pub fn last_scan(&self) -> Option<ScanRecord> {
        self.state.lock().last_scan.clone()
    }

    /// Register a connection for scan fan-out
    pub fn attach(&self, listener: &Arc<Listener>) {
        let mut state = self.state.lock();
        state.listeners.push(Arc::downgrade(listener));
        log::info!(
            "[{}] Client {} connected ({} listeners)",
            self.id,
            listener.peer(),
            state.listeners.len()
        );
    }

    /// Remove a connection; the last one leaving stops scanning
    pub fn detach(&self, listener_id: u64) {
        let mut state = self.state.lock();
        state
            .listeners
            .retain(|w| w.upgrade().is_some_and(|l| l.id() != listener_id));
        if state.listeners.is_empty() && state.mode == ScanMode::Scanning {
            state.mode = ScanMode::Idle;
            log::info!("[{}] Last client left, scanning stopped", self.id);
        }
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Apply one inbound command and build the reply frame
    pub fn handle_message(&self, msg: &Message) -> Vec<u8> {
        let name = msg.command();
        match name {
            CMD_SENSOR_START => {
                self.set_mode(ScanMode::Scanning);
                encode_ack(name)
            }
            CMD_SENSOR_STOP => {
                self.set_mode(ScanMode::Idle);
                encode_ack(name)
            }
            CMD_SCAN_DATA_CONFIG if msg.tag() == ClassTag::WriteRequest || !msg.args().is_empty() => {
                self.apply_window_write(msg.args());
                encode_write_ack(name)
            }
            CMD_SCAN_DATA_CONFIG => encode_scan_window_reply(&self.window()),
            _ => {
                log::debug!("[{}] {} {} acknowledged", self.id, msg.tag(), name);
                encode_ack(name)
            }
        }
    }

    fn set_mode(&self, mode: ScanMode) {
        let mut state = self.state.lock();
        if state.mode != mode {
            log::info!("[{}] {:?} -> {:?}", self.id, state.mode, mode);
            state.mode = mode;
        }
    }

    /// Rejected writes keep the current window
    fn apply_window_write(&self, args: &[String]) {
        let current = self.window();
        let result = parse_window_args(args, current.resolution)
            .and_then(|window| self.set_window(window).map(|()| window));

        match result {
            Ok(window) => log::info!(
                "[{}] Scan window set to [{:.3}, {:.3}] step {:.3} ({} samples)",
                self.id,
                window.min_angle,
                window.max_angle,
                window.resolution,
                window.sample_count()
            ),
            Err(e) => log::warn!("[{}] Scan window rejected, keeping current: {}", self.id, e),
        }
    }

    /// Cast one scan and queue it on every listener
    ///
    /// Returns the number of listeners reached. Idle sensors do nothing.
    pub fn broadcast(&self, snapshot: &EnvironmentSnapshot) -> usize {
        let mut state = self.state.lock();
        if state.mode != ScanMode::Scanning {
            return 0;
        }

        let listeners: Vec<Arc<Listener>> =
            state.listeners.iter().filter_map(Weak::upgrade).collect();
        state.listeners.retain(|w| w.strong_count() > 0);
        if listeners.is_empty() {
            state.mode = ScanMode::Idle;
            log::info!("[{}] No listeners left, scanning stopped", self.id);
            return 0;
        }

        let scene = LocalScene::new(&state.pose, snapshot);
        let window = state.window;
        let ranges: Vec<f32> = state
            .ray_caster
            .cast_mm(&scene, &window)
            .into_iter()
            .map(mm_to_meters)
            .collect();

        let count = ranges.len() as u32;
        let record = ScanRecord {
            scan_counter: state.scan_counter,
            scan_freq: (self.scan_rate_hz * 100.0).round() as u32,
            meas_freq: (count as f32 * self.scan_rate_hz).round() as u32,
            angle_begin: angle_to_fixed(window.min_angle),
            angle_resol: angle_to_fixed(window.resolution) as u32,
            amount_of_data: count,
            ranges,
            rssi: Vec::new(),
        };
        state.scan_counter = state.scan_counter.wrapping_add(1);

        let timestamp_us = self.started.elapsed().as_micros() as u64;
        let frame: Frame = Arc::from(encode_scan_notification(&record, timestamp_us));
        for listener in &listeners {
            listener.send(Arc::clone(&frame));
        }

        log::trace!(
            "[{}] Scan {} ({} samples) to {} listeners",
            self.id,
            record.scan_counter,
            count,
            listeners.len()
        );
        state.last_scan = Some(record);
        listeners.len()
    }
}

/// Parse `minHex,maxHex[,resHex]` write arguments
fn parse_window_args(args: &[String], default_resolution: f32) -> Result<ScanWindow> {
    let [min, max, rest @ ..] = args else {
        return Err(Error::Protocol(format!(
            "{} expects at least 2 arguments, got {}",
            CMD_SCAN_DATA_CONFIG,
            args.len()
        )));
    };
    let resolution = match rest.first() {
        Some(res) => hex_to_angle(res)?,
        None => default_resolution,
    };
    Ok(ScanWindow {
        min_angle: hex_to_angle(min)?,
        max_angle: hex_to_angle(max)?,
        resolution,
    })
}
