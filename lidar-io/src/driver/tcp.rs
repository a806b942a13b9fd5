//! TCP rangefinder driver
//!
//! Commands are written directly from the caller's thread. A background
//! reader thread reassembles frames, decodes scan notifications and fans
//! them out to subscribers. Replies (`sRA`/`sWA`) are only logged: the
//! device is assumed to accept every command.
//!
//! # Example
//!
//! ```ignore
//! use lidar_io::driver::{DriverEvent, LidarDriver, TcpLidarDriver};
//!
//! let mut driver = TcpLidarDriver::default();
//! driver.connect("127.0.0.1:8001")?;
//! let events = driver.subscribe();
//! driver.initialize()?;
//!
//! while let Ok(DriverEvent::Scan(scan)) = events.recv() {
//!     println!("scan {} with {} points", scan.scan_counter, scan.ranges.len());
//! }
//! ```

use super::{DriverEvent, LidarDriver, Subscription};
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::protocol::command::{encode_command, scan_range_args};
use crate::protocol::constants::*;
use crate::protocol::frame::FrameDecoder;
use crate::protocol::message::Message;
use crate::queue::DropOldestQueue;
use crate::types::{ScanRecord, ScanWindow};
use parking_lot::Mutex;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

const READ_CHUNK: usize = 8192;

/// State shared with the reader thread
struct Shared {
    subscribers: Mutex<Vec<Weak<DropOldestQueue<DriverEvent>>>>,
    latest_scan: Mutex<Option<ScanRecord>>,
    subscriber_capacity: usize,
}

impl Shared {
    /// Push to every live subscriber, forgetting dropped ones
    fn publish(&self, event: DriverEvent) {
        self.subscribers.lock().retain(|weak| match weak.upgrade() {
            Some(queue) => {
                queue.push(event.clone());
                true
            }
            None => false,
        });
    }
}

/// Driver speaking the framed ASCII protocol over TCP
pub struct TcpLidarDriver {
    config: DriverConfig,
    stream: Option<TcpStream>,
    reader: Option<JoinHandle<()>>,
    /// Per-connection alive flag, cleared by `disconnect()`
    alive: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl TcpLidarDriver {
    pub fn new(config: DriverConfig) -> Self {
        let shared = Arc::new(Shared {
            subscribers: Mutex::new(Vec::new()),
            latest_scan: Mutex::new(None),
            subscriber_capacity: config.subscriber_capacity,
        });
        Self {
            config,
            stream: None,
            reader: None,
            alive: Arc::new(AtomicBool::new(false)),
            shared,
        }
    }

    /// Subscribe with a custom queue depth
    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription {
        let queue = Arc::new(DropOldestQueue::new(capacity));
        self.shared.subscribers.lock().push(Arc::downgrade(&queue));
        Subscription::new(queue)
    }

    /// Number of subscriptions still held by callers
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Query the current scan window; the reply is logged by the reader
    pub fn query_scan_range(&mut self) -> Result<()> {
        self.send_command(CMD_SCAN_DATA_CONFIG, None)
    }

    fn login(&mut self) -> Result<()> {
        let code = self.config.access_code.clone();
        self.send_command(CMD_SET_ACCESS_LEVEL, Some(code.as_str()))?;
        thread::sleep(self.config.settle_interval);
        Ok(())
    }
}

impl Default for TcpLidarDriver {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

impl LidarDriver for TcpLidarDriver {
    fn connect(&mut self, address: &str) -> Result<()> {
        self.disconnect();

        let addr = address
            .to_socket_addrs()
            .map_err(|e| Error::Connection(format!("Invalid address {}: {}", address, e)))?
            .next()
            .ok_or_else(|| Error::Connection(format!("No address for {}", address)))?;
        let stream = TcpStream::connect(addr)
            .map_err(|e| Error::Connection(format!("Failed to connect to {}: {}", address, e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY: {}", e);
        }
        stream.set_read_timeout(Some(self.config.read_timeout))?;
        let read_stream = stream.try_clone()?;

        let alive = Arc::new(AtomicBool::new(true));
        let reader = Reader {
            decoder: FrameDecoder::with_limits(
                self.config.protocol.max_buffer,
                self.config.protocol.strict_length,
            ),
            shared: Arc::clone(&self.shared),
            alive: Arc::clone(&alive),
        };
        let handle = thread::Builder::new()
            .name("lidar-reader".to_string())
            .spawn(move || reader.run(read_stream))
            .map_err(|e| Error::Other(format!("Failed to spawn reader thread: {}", e)))?;

        log::info!("Connected to {}", address);
        self.alive = alive;
        self.stream = Some(stream);
        self.reader = Some(handle);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            log::info!("Disconnected");
        }
        if let Some(handle) = self.reader.take()
            && handle.join().is_err()
        {
            log::error!("Reader thread panicked");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some() && self.alive.load(Ordering::Relaxed)
    }

    fn initialize(&mut self) -> Result<()> {
        self.login()?;
        self.send_command(CMD_SENSOR_START, None)
    }

    fn configure_scan_range(&mut self, min_angle: f32, max_angle: f32) -> Result<()> {
        // Resolution is not sent; only the bounds need checking
        ScanWindow {
            min_angle,
            max_angle,
            resolution: 1.0,
        }
        .validate()?;
        self.login()?;
        let args = scan_range_args(min_angle, max_angle);
        self.send_command(CMD_SCAN_DATA_CONFIG, Some(args.as_str()))
    }

    fn stop(&mut self) -> Result<()> {
        self.send_command(CMD_SENSOR_STOP, None)
    }

    fn send_command(&mut self, name: &str, args: Option<&str>) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let frame = encode_command(name, args);
        if let Err(e) = stream.write_all(&frame) {
            let err = Error::Connection(format!("Failed to send {}: {}", name, e));
            log::error!("{}", err);
            self.shared.publish(DriverEvent::Error(err.to_string()));
            self.disconnect();
            return Err(err);
        }
        log::debug!("-> {} {}", name, args.unwrap_or(""));
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.subscribe_with_capacity(self.shared.subscriber_capacity)
    }

    fn latest_scan(&self) -> Option<ScanRecord> {
        self.shared.latest_scan.lock().clone()
    }
}

impl Drop for TcpLidarDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Background frame reader
struct Reader {
    decoder: FrameDecoder,
    shared: Arc<Shared>,
    alive: Arc<AtomicBool>,
}

impl Reader {
    fn run(mut self, mut stream: TcpStream) {
        let mut buf = vec![0u8; READ_CHUNK];

        while self.alive.load(Ordering::Relaxed) {
            match stream.read(&mut buf) {
                Ok(0) => {
                    log::info!("Connection closed by peer");
                    break;
                }
                Ok(n) => self.handle_bytes(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
                Err(e) => {
                    // Errors after disconnect() are our own shutdown
                    if self.alive.load(Ordering::Relaxed) {
                        log::error!("Connection error: {}", e);
                        self.shared.publish(DriverEvent::Error(
                            Error::Connection(e.to_string()).to_string(),
                        ));
                    }
                    break;
                }
            }
        }

        self.alive.store(false, Ordering::Relaxed);
        self.shared.publish(DriverEvent::Disconnected);
    }

    fn handle_bytes(&mut self, bytes: &[u8]) {
        let payloads: Vec<Vec<u8>> = self.decoder.feed(bytes).collect();
        for payload in payloads {
            let msg = match Message::parse(&payload) {
                Ok(msg) => msg,
                Err(e) => {
                    log::warn!("Dropping frame: {}", e);
                    continue;
                }
            };

            if !msg.is_scan() {
                log::debug!("<- {} {} {}", msg.tag(), msg.command(), msg.args().join(","));
                continue;
            }

            match ScanRecord::decode(&msg) {
                Ok(scan) => {
                    log::trace!(
                        "Scan {}: {} points from {:.2}°",
                        scan.scan_counter,
                        scan.ranges.len(),
                        scan.angle_begin_deg()
                    );
                    *self.shared.latest_scan.lock() = Some(scan.clone());
                    self.shared.publish(DriverEvent::Scan(scan));
                }
                Err(e) => log::warn!("Dropping scan: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Duration;

    #[test]
    fn test_send_without_connection() {
        let mut driver = TcpLidarDriver::default();
        assert!(!driver.is_connected());
        assert!(matches!(driver.initialize(), Err(Error::NotConnected)));
        assert!(matches!(
            driver.send_command(CMD_SENSOR_STOP, None),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn test_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut driver = TcpLidarDriver::default();
        let result = driver.connect(&format!("127.0.0.1:{}", port));
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[test]
    fn test_dropped_subscription_is_forgotten() {
        let driver = TcpLidarDriver::default();
        let kept = driver.subscribe();
        let gone = driver.subscribe_with_capacity(4);
        assert_eq!(driver.subscriber_count(), 2);

        drop(gone);
        assert_eq!(driver.subscriber_count(), 1);

        driver.shared.publish(DriverEvent::Disconnected);
        assert_eq!(driver.shared.subscribers.lock().len(), 1);
        assert_eq!(kept.try_recv(), Ok(DriverEvent::Disconnected));
    }

    #[test]
    fn test_invalid_range_rejected_before_send() {
        let mut driver = TcpLidarDriver::default();
        assert!(matches!(
            driver.configure_scan_range(10.0, -10.0),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_initialize_sends_login_then_start() {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let mut driver = TcpLidarDriver::new(DriverConfig {
            settle_interval: Duration::from_millis(10),
            ..DriverConfig::default()
        });
        driver.connect(&addr.to_string()).unwrap();
        let (mut peer, _) = server.accept().unwrap();
        driver.initialize().unwrap();
        driver.disconnect();

        let mut received = Vec::new();
        peer.read_to_end(&mut received).unwrap();
        let text = String::from_utf8_lossy(&received);
        let login = text.find("sMC,SetAccessLevel,0000").unwrap();
        let start = text.find("sMC,SensorStart").unwrap();
        assert!(login < start);
    }

    #[test]
    fn test_scan_published_and_latest_kept() {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let mut driver = TcpLidarDriver::default();
        driver.connect(&addr.to_string()).unwrap();
        let events = driver.subscribe_with_capacity(8);
        let (mut peer, _) = server.accept().unwrap();

        let record = ScanRecord {
            scan_counter: 7,
            scan_freq: 1000,
            meas_freq: 40,
            angle_begin: -450_000,
            angle_resol: 10_000,
            amount_of_data: 4,
            ranges: vec![1.0, 2.0, 3.0, 4.0],
            rssi: Vec::new(),
        };
        let frame = crate::protocol::command::encode_scan_notification(&record, 0);
        // Split across writes to exercise reassembly
        peer.write_all(&frame[..10]).unwrap();
        peer.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
        peer.write_all(&frame[10..]).unwrap();

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, DriverEvent::Scan(record.clone()));
        assert_eq!(driver.latest_scan(), Some(record));

        drop(peer);
        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, DriverEvent::Disconnected);
    }
}
