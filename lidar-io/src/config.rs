//! Configuration for lidar-io
//!
//! The simulator loads a TOML file; every parameter has a default so an
//! empty file (or no file at all) yields a working single-sensor setup.
//!
//! ```toml
//! [simulation]
//! tick_hz = 10.0          # Scan broadcast rate
//! phase_step = 0.05       # Obstacle phase advance per tick (radians)
//! random_seed = 42        # 0 = random each run
//! noise_amplitude = 0.01  # ±1 cm range noise
//!
//! [environment]
//! room_half_size = 10.0
//! obstacle = { radius = 0.5, orbit_radius = 4.0 }
//!
//! [protocol]
//! strict_length = false
//!
//! [[sensors]]
//! id = "front"
//! bind_address = "0.0.0.0:8001"
//! pose = { x = 0.0, y = 0.0, rotation = 0.0 }
//! window = { min_angle = -45.0, max_angle = 225.0, resolution = 0.333 }
//! ```

use crate::error::{Error, Result};
use crate::protocol::constants::DEFAULT_ACCESS_CODE;
use crate::protocol::frame::DEFAULT_MAX_BUFFER;
use crate::sim::environment::Environment;
use crate::sim::raycast::DEFAULT_MAX_RANGE;
use crate::types::{ScanWindow, SensorPose};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level simulator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub protocol: ProtocolSettings,
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorConfig>,
}

/// Simulation timing and noise
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Broadcast tick rate (Hz); also the advertised scan frequency
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f32,

    /// Obstacle phase advance per tick (radians)
    #[serde(default = "default_phase_step")]
    pub phase_step: f64,

    /// Obstacle phase at startup (radians)
    #[serde(default)]
    pub initial_phase: f64,

    /// Noise seed (0 = random entropy)
    #[serde(default)]
    pub random_seed: u64,

    /// Symmetric range noise bound (meters)
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f32,

    /// Range reported when a ray hits nothing (meters)
    #[serde(default = "default_max_range")]
    pub max_range: f32,

    /// Outbound frames buffered per connection before the oldest is dropped
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

fn default_tick_hz() -> f32 {
    10.0
}
fn default_phase_step() -> f64 {
    0.05
}
fn default_noise_amplitude() -> f32 {
    0.01
}
fn default_max_range() -> f32 {
    DEFAULT_MAX_RANGE
}
fn default_outbound_queue() -> usize {
    32
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            phase_step: default_phase_step(),
            initial_phase: 0.0,
            random_seed: 0,
            noise_amplitude: default_noise_amplitude(),
            max_range: default_max_range(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl SimulationSettings {
    /// Interval between broadcast ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }
}

/// Stream framing limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolSettings {
    /// Drop frames whose declared length does not match their size
    #[serde(default)]
    pub strict_length: bool,

    /// Largest unterminated frame kept while waiting for more bytes
    #[serde(default = "default_max_buffer")]
    pub max_buffer: usize,
}

fn default_max_buffer() -> usize {
    DEFAULT_MAX_BUFFER
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            strict_length: false,
            max_buffer: default_max_buffer(),
        }
    }
}

/// One simulated sensor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    /// Registry key
    pub id: String,

    /// TCP listen address, e.g. `0.0.0.0:8001`
    pub bind_address: String,

    #[serde(default)]
    pub pose: SensorPose,

    /// Window at startup
    #[serde(default)]
    pub window: ScanWindow,
}

fn default_sensors() -> Vec<SensorConfig> {
    vec![SensorConfig {
        id: "lidar0".to_string(),
        bind_address: "0.0.0.0:8001".to_string(),
        pose: SensorPose::default(),
        window: ScanWindow::default(),
    }]
}

impl SimulatorConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: SimulatorConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.simulation.tick_hz.is_nan() || self.simulation.tick_hz <= 0.0 {
            return Err(Error::Config(format!(
                "tick_hz must be positive, got {}",
                self.simulation.tick_hz
            )));
        }
        if self.environment.room_half_size.is_nan() || self.environment.room_half_size <= 0.0 {
            return Err(Error::Config(format!(
                "room_half_size must be positive, got {}",
                self.environment.room_half_size
            )));
        }
        if self.environment.obstacle.radius < 0.0 {
            return Err(Error::Config("obstacle radius must not be negative".to_string()));
        }
        if self.sensors.is_empty() {
            return Err(Error::Config("at least one sensor is required".to_string()));
        }

        let mut ids = HashSet::new();
        for sensor in &self.sensors {
            if !ids.insert(sensor.id.as_str()) {
                return Err(Error::Config(format!("duplicate sensor id {:?}", sensor.id)));
            }
            sensor
                .window
                .validate()
                .map_err(|e| Error::Config(format!("sensor {}: {}", sensor.id, e)))?;
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationSettings::default(),
            environment: Environment::default(),
            protocol: ProtocolSettings::default(),
            sensors: default_sensors(),
        }
    }
}

/// Client driver settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Code sent with SetAccessLevel
    pub access_code: String,
    /// Pause between login and the following command
    pub settle_interval: Duration,
    /// Socket read timeout; bounds how quickly disconnect() is noticed
    pub read_timeout: Duration,
    /// Events buffered per subscriber before the oldest is dropped
    pub subscriber_capacity: usize,
    pub protocol: ProtocolSettings,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            access_code: DEFAULT_ACCESS_CODE.to_string(),
            settle_interval: Duration::from_millis(100),
            read_timeout: Duration::from_millis(500),
            subscriber_capacity: 1,
            protocol: ProtocolSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensors.len(), 1);
        assert_eq!(config.sensors[0].bind_address, "0.0.0.0:8001");
        assert_eq!(config.simulation.tick_hz, 10.0);
        assert_eq!(config.environment.room_half_size, 10.0);
        assert!(!config.protocol.strict_length);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: SimulatorConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensors[0].id, "lidar0");
        assert_eq!(config.simulation.outbound_queue, 32);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[simulation]
tick_hz = 20.0
random_seed = 7

[environment]
room_half_size = 5.0
obstacle = { radius = 0.25, orbit_radius = 2.0 }

[protocol]
strict_length = true

[[sensors]]
id = "left"
bind_address = "127.0.0.1:9001"
pose = { x = -4.0, y = 0.0, rotation = 90.0 }

[[sensors]]
id = "right"
bind_address = "127.0.0.1:9002"
window = { min_angle = 0.0, max_angle = 180.0, resolution = 0.5 }
"#;

        let config: SimulatorConfig = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.tick_hz, 20.0);
        assert_eq!(config.simulation.random_seed, 7);
        assert_eq!(config.simulation.noise_amplitude, 0.01);
        assert_eq!(config.environment.obstacle.orbit_radius, 2.0);
        assert!(config.protocol.strict_length);
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.sensors[0].pose.rotation, 90.0);
        assert_eq!(config.sensors[0].window, ScanWindow::default());
        assert_eq!(config.sensors[1].window.resolution, 0.5);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut config = SimulatorConfig::default();
        config.sensors.push(config.sensors[0].clone());
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_bad_window() {
        let mut config = SimulatorConfig::default();
        config.sensors[0].window.resolution = 0.0;
        assert!(config.validate().is_err());

        config.sensors[0].window.resolution = 1e-40;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\ntick_hz = 5.0").unwrap();
        let config = SimulatorConfig::load(file.path()).unwrap();
        assert_eq!(config.simulation.tick_hz, 5.0);
        assert_eq!(config.simulation.tick_interval().as_millis(), 200);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            SimulatorConfig::load("/nonexistent/lidar-sim.toml"),
            Err(Error::Config(_))
        ));
    }
}
