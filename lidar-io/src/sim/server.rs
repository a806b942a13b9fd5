//! TCP front end for a simulated sensor
//!
//! Each sensor listens on its own address. Every accepted client gets:
//!
//! - a **reader** thread: bytes → [`FrameDecoder`] → [`Message`] →
//!   [`SimulatedSensor::handle_message`], reply queued on the client's
//!   outbound queue, so commands are answered strictly in arrival order
//! - a **writer** thread: drains the outbound queue (replies and scans
//!   interleaved) onto the socket
//!
//! # Connection Lifecycle
//!
//! ```text
//! 1. Client connects; a Listener is attached to the sensor (Weak handle)
//! 2. Reader loop handles commands until EOF, reset or shutdown
//! 3. Reader clears the alive flag, detaches the listener, joins the writer
//! 4. Dropping the last listener disarms the sensor
//! ```
//!
//! Malformed frames are logged and dropped; the connection stays open.

use super::sensor::{Frame, Listener, SimulatedSensor};
use crate::config::ProtocolSettings;
use crate::error::{Error, Result};
use crate::protocol::frame::FrameDecoder;
use crate::protocol::message::Message;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Read timeout so the reader can check its flags periodically
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// How long the writer waits for a frame before re-checking its flags
const WRITE_POLL: Duration = Duration::from_millis(100);

/// Sleep between non-blocking accept attempts
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Pause after a failed accept (e.g. EMFILE) before retrying
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 4096;

/// Bound listening socket for one sensor
pub struct SensorServer {
    sensor: Arc<SimulatedSensor>,
    listener: TcpListener,
    protocol: ProtocolSettings,
    outbound_capacity: usize,
}

impl SensorServer {
    /// Bind the sensor's configured address
    pub fn bind(
        sensor: Arc<SimulatedSensor>,
        protocol: ProtocolSettings,
        outbound_capacity: usize,
    ) -> Result<Self> {
        let addr = sensor.bind_address().to_string();
        let listener = TcpListener::bind(&addr)
            .map_err(|e| Error::Connection(format!("Failed to bind to {}: {}", addr, e)))?;
        if let Err(e) = listener.set_nonblocking(true) {
            log::warn!("Failed to set nonblocking mode: {}", e);
        }
        Ok(Self {
            sensor,
            listener,
            protocol,
            outbound_capacity,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Spawn the accept loop; it exits when `running` is cleared
    pub fn spawn(self, running: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
        let name = format!("accept-{}", self.sensor.id());
        thread::Builder::new()
            .name(name)
            .spawn(move || self.accept_loop(running))
            .map_err(|e| Error::Other(format!("Failed to spawn accept thread: {}", e)))
    }

    fn accept_loop(self, running: Arc<AtomicBool>) {
        log::info!(
            "[{}] Listening on {}",
            self.sensor.id(),
            self.local_addr()
                .map_or_else(|_| self.sensor.bind_address().to_string(), |a| a.to_string())
        );

        let mut connections: Vec<JoinHandle<()>> = Vec::new();
        while running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        log::error!("Failed to set socket to blocking mode: {}", e);
                        continue;
                    }
                    let connection = Connection {
                        sensor: Arc::clone(&self.sensor),
                        listener: Arc::new(Listener::new(addr.to_string(), self.outbound_capacity)),
                        decoder: FrameDecoder::with_limits(
                            self.protocol.max_buffer,
                            self.protocol.strict_length,
                        ),
                        running: Arc::clone(&running),
                        alive: Arc::new(AtomicBool::new(true)),
                    };
                    match thread::Builder::new()
                        .name(format!("conn-{}", addr))
                        .spawn(move || connection.run(stream))
                    {
                        Ok(handle) => connections.push(handle),
                        Err(e) => log::error!("Failed to spawn connection thread: {}", e),
                    }
                    connections.retain(|h| !h.is_finished());
                }
                Err(e) => {
                    if e.kind() != ErrorKind::WouldBlock {
                        log::error!("[{}] Accept error: {}", self.sensor.id(), e);
                    }
                    thread::sleep(accept_delay(e.kind()));
                }
            }
        }

        for handle in connections {
            let _ = handle.join();
        }
        log::info!("[{}] Server stopped", self.sensor.id());
    }
}

/// One client connection
struct Connection {
    sensor: Arc<SimulatedSensor>,
    listener: Arc<Listener>,
    decoder: FrameDecoder,
    /// Global running flag (simulator shutdown)
    running: Arc<AtomicBool>,
    /// Per-connection alive flag
    alive: Arc<AtomicBool>,
}

impl Connection {
    fn run(mut self, mut stream: TcpStream) {
        let peer = self.listener.peer().to_string();
        if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
            log::warn!("Failed to set read timeout: {}", e);
        }

        let writer = match stream.try_clone() {
            Ok(write_stream) => {
                let listener = Arc::clone(&self.listener);
                let running = Arc::clone(&self.running);
                let alive = Arc::clone(&self.alive);
                thread::Builder::new()
                    .name(format!("writer-{}", peer))
                    .spawn(move || write_loop(write_stream, &listener, &running, &alive))
                    .ok()
            }
            Err(e) => {
                log::error!("Failed to clone stream for {}: {}", peer, e);
                None
            }
        };
        if writer.is_none() {
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }

        self.sensor.attach(&self.listener);

        match self.read_loop(&mut stream) {
            Ok(()) => log::info!("[{}] Client {} disconnected", self.sensor.id(), peer),
            Err(e) => log::error!("[{}] Client {} error: {}", self.sensor.id(), peer, e),
        }

        self.alive.store(false, Ordering::Relaxed);
        let _ = stream.shutdown(Shutdown::Both);
        self.sensor.detach(self.listener.id());
        if let Some(handle) = writer {
            let _ = handle.join();
        }
    }

    fn read_loop(&mut self, stream: &mut TcpStream) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        while self.running.load(Ordering::Relaxed) && self.alive.load(Ordering::Relaxed) {
            let n = match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    continue;
                }
                Err(e)
                    if e.kind() == ErrorKind::ConnectionReset
                        || e.kind() == ErrorKind::UnexpectedEof =>
                {
                    return Ok(());
                }
                Err(e) => return Err(Error::Io(e)),
            };

            let payloads: Vec<Vec<u8>> = self.decoder.feed(&buf[..n]).collect();
            for payload in payloads {
                match Message::parse(&payload) {
                    Ok(msg) => {
                        log::debug!("[{}] <- {} {}", self.sensor.id(), msg.tag(), msg.command());
                        let reply: Frame = Arc::from(self.sensor.handle_message(&msg));
                        self.listener.send_reply(reply);
                    }
                    Err(e) => log::warn!("[{}] Dropping frame: {}", self.sensor.id(), e),
                }
            }
        }
        Ok(())
    }
}

fn write_loop(mut stream: TcpStream, listener: &Listener, running: &AtomicBool, alive: &AtomicBool) {
    while running.load(Ordering::Relaxed) && alive.load(Ordering::Relaxed) {
        let Some(frame) = listener.next_frame(WRITE_POLL) else {
            continue;
        };
        if let Err(e) = stream.write_all(&frame) {
            log::debug!("Write to {} failed: {}", listener.peer(), e);
            alive.store(false, Ordering::Relaxed);
            let _ = stream.shutdown(Shutdown::Both);
            break;
        }
    }
}

/// Wait before the next accept attempt
fn accept_delay(kind: ErrorKind) -> Duration {
    match kind {
        ErrorKind::WouldBlock => ACCEPT_POLL,
        _ => ACCEPT_ERROR_BACKOFF,
    }
}
