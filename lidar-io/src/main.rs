//! lidar-sim - Simulated laser rangefinder daemon
//!
//! Serves one TCP port per configured sensor. Clients speak the framed ASCII
//! protocol: `SensorStart` begins scan notifications at the tick rate,
//! `SensorStop` ends them, `LSScanDataConfig` changes the scan window.
//!
//! ```text
//! lidar-sim                         # one sensor on 0.0.0.0:8001
//! lidar-sim --config sim.toml       # sensors, room and noise from file
//! RUST_LOG=debug lidar-sim          # log every command
//! ```

use clap::Parser;
use lidar_io::{Error, Result, Simulator, SimulatorConfig};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

/// Simulated laser rangefinder daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("lidar-sim v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => {
            log::info!("Using config: {}", path.display());
            SimulatorConfig::load(path)?
        }
        None => {
            log::info!("No config given, using defaults");
            SimulatorConfig::default()
        }
    };

    for sensor in &config.sensors {
        log::info!(
            "Sensor {}: {} at ({:.2}, {:.2}) rot {:.1}°, window [{}, {}] step {}",
            sensor.id,
            sensor.bind_address,
            sensor.pose.x,
            sensor.pose.y,
            sensor.pose.rotation,
            sensor.window.min_angle,
            sensor.window.max_angle,
            sensor.window.resolution
        );
    }

    let handle = Simulator::new(config)?.start()?;

    // Set up shutdown signal handler
    let running = handle.running();
    let r = running.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("lidar-sim running. Press Ctrl-C to stop.");
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutting down...");
    handle.shutdown();
    log::info!("lidar-sim stopped");
    Ok(())
}
