//! lidar-probe - Connect to a rangefinder and report scan throughput
//!
//! Logs in, optionally sets the scan window, starts scanning and prints
//! frames/s and points/s once a second until interrupted or the link drops.
//!
//! ```text
//! lidar-probe                               # 127.0.0.1:8001
//! lidar-probe 192.168.0.33:8001 --min -45 --max 225
//! ```

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use lidar_io::driver::{DriverEvent, LidarDriver, ScanStats, TcpLidarDriver};
use lidar_io::{DriverConfig, Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Frame rate below which a warning is printed
const LOW_FPS_THRESHOLD: f64 = 5.0;

/// Rangefinder throughput probe
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sensor address (host:port)
    #[arg(default_value = "127.0.0.1:8001")]
    address: String,

    /// Scan window start (degrees); requires --max
    #[arg(long, requires = "max", allow_hyphen_values = true)]
    min: Option<f32>,

    /// Scan window end (degrees); requires --min
    #[arg(long, requires = "min", allow_hyphen_values = true)]
    max: Option<f32>,

    /// Access code for SetAccessLevel
    #[arg(long, default_value = "0000")]
    access_code: String,

    /// Seconds without any scan before reporting a read timeout
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Stop after this many seconds (0 = run until Ctrl-C)
    #[arg(long, default_value = "0")]
    duration: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || r.store(false, Ordering::Relaxed))
        .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut driver = TcpLidarDriver::new(DriverConfig {
        access_code: args.access_code.clone(),
        ..DriverConfig::default()
    });

    println!("[lidar-probe] Target: {}", args.address);
    driver.connect(&args.address)?;
    let events = driver.subscribe_with_capacity(16);

    if let (Some(min), Some(max)) = (args.min, args.max) {
        println!("[lidar-probe] Setting scan window [{}, {}]", min, max);
        driver.configure_scan_range(min, max)?;
    }
    driver.initialize()?;
    println!("[lidar-probe] Init sent, waiting for data...");

    let started = Instant::now();
    let deadline = (args.duration > 0).then(|| started + Duration::from_secs(args.duration));
    let timeout = Duration::from_secs(args.timeout.max(1));
    let mut stats = ScanStats::starting_at(started);
    let mut last_scan = Instant::now();

    while running.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(DriverEvent::Scan(scan)) => {
                stats.record(&scan);
                last_scan = Instant::now();
            }
            Ok(DriverEvent::Error(reason)) => eprintln!("[lidar-probe] Error: {}", reason),
            Ok(DriverEvent::Disconnected) | Err(RecvTimeoutError::Disconnected) => {
                println!("[lidar-probe] Connection closed by sensor");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if last_scan.elapsed() >= timeout {
                    println!("[lidar-probe] Read timeout...");
                    last_scan = Instant::now();
                }
            }
        }

        if let Some(rate) = stats.poll(Instant::now(), Duration::from_secs(1)) {
            println!(
                "--- [Stats] FPS: {:.2} | Points/sec: {} ---",
                rate.frames_per_sec, rate.points_per_sec as u64
            );
            if rate.frames_per_sec > 0.0 && rate.frames_per_sec < LOW_FPS_THRESHOLD {
                println!("[WARNING] Low FPS detected: {:.2}", rate.frames_per_sec);
            }
        }
    }

    if driver.is_connected()
        && let Err(e) = driver.stop()
    {
        log::warn!("Failed to stop scanning: {}", e);
    }
    driver.disconnect();
    println!(
        "[lidar-probe] {} scans, {} points in {:.1}s",
        stats.total_frames(),
        stats.total_points(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
