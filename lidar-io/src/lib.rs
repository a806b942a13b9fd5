//! lidar-io - Laser rangefinder protocol, driver and simulator
//!
//! This library speaks the framed ASCII protocol used by 2D laser
//! rangefinders and provides both ends of the link:
//!
//! - [`protocol`]: STX/ETX framing, command encoding, message and scan decoding
//! - [`driver`]: TCP client driver publishing decoded scans
//! - [`sim`]: multi-sensor simulator ray-casting a room with a moving obstacle
//!
//! The `lidar-sim` binary runs the simulator; `lidar-probe` connects a driver
//! and prints scan statistics.

pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod sim;
pub mod types;

// Re-export commonly used types
pub use config::{DriverConfig, SimulatorConfig};
pub use driver::{DriverEvent, LidarDriver, ScanStats, Subscription, TcpLidarDriver};
pub use error::{Error, Result};
pub use sim::{SimulatedSensor, Simulator, SimulatorHandle};
pub use types::{ScanRecord, ScanWindow, SensorPose};
