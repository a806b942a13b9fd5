//! Client-side rangefinder driver
//!
//! A driver owns one TCP connection to a sensor (real or simulated), sends
//! commands and publishes decoded scans to any number of subscribers.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `Scan(record)` | A `ScanData` notification was decoded |
//! | `Error(reason)` | The transport failed while connected |
//! | `Disconnected` | The reader stopped (EOF, failure or `disconnect()`) |
//!
//! Subscriber queues are bounded and drop their oldest event when full, so
//! a slow consumer only ever sees the most recent scans. The driver holds
//! each queue weakly; dropping the [`Subscription`] unsubscribes.

pub mod stats;
pub mod tcp;

pub use stats::{ScanRate, ScanStats};
pub use tcp::TcpLidarDriver;

use crate::error::Result;
use crate::queue::DropOldestQueue;
use crate::types::ScanRecord;
use crossbeam_channel::Receiver;
use std::ops::Deref;
use std::sync::Arc;

/// Event published by a driver
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Scan(ScanRecord),
    Disconnected,
    Error(String),
}

/// Event stream of one subscriber
///
/// Dereferences to the underlying [`Receiver`].
pub struct Subscription {
    queue: Arc<DropOldestQueue<DriverEvent>>,
    rx: Receiver<DriverEvent>,
}

impl Subscription {
    pub(crate) fn new(queue: Arc<DropOldestQueue<DriverEvent>>) -> Self {
        let rx = queue.receiver();
        Self { queue, rx }
    }

    /// Events discarded because this subscriber fell behind
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }
}

impl Deref for Subscription {
    type Target = Receiver<DriverEvent>;

    fn deref(&self) -> &Self::Target {
        &self.rx
    }
}

/// Rangefinder driver interface
pub trait LidarDriver: Send {
    /// Open a connection to `address` (`host:port`)
    fn connect(&mut self, address: &str) -> Result<()>;

    /// Close the connection; no-op when not connected
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Log in, then start scanning
    fn initialize(&mut self) -> Result<()>;

    /// Log in, then set the scan window to `[min_angle, max_angle]` degrees
    fn configure_scan_range(&mut self, min_angle: f32, max_angle: f32) -> Result<()>;

    /// Stop scanning
    fn stop(&mut self) -> Result<()>;

    /// Send a raw command with optional comma-joined arguments
    fn send_command(&mut self, name: &str, args: Option<&str>) -> Result<()>;

    /// New event stream for this driver
    fn subscribe(&self) -> Subscription;

    /// Most recent decoded scan, if any
    fn latest_scan(&self) -> Option<ScanRecord>;
}
