//! Simulator and driver talking over loopback TCP.

use lidar_io::config::{DriverConfig, SensorConfig, SimulatorConfig};
use lidar_io::driver::{DriverEvent, LidarDriver, Subscription, TcpLidarDriver};
use lidar_io::protocol::command::encode_command;
use lidar_io::protocol::constants::*;
use lidar_io::protocol::{FrameDecoder, Message};
use lidar_io::sim::{ScanMode, Simulator, SimulatorHandle};
use lidar_io::types::{ScanRecord, ScanWindow, SensorPose};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn start_simulator() -> SimulatorHandle {
    let mut config = SimulatorConfig::default();
    config.simulation.tick_hz = 50.0;
    config.simulation.random_seed = 42;
    config.sensors = vec![SensorConfig {
        id: "front".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        pose: SensorPose::default(),
        window: ScanWindow::default(),
    }];
    Simulator::new(config).unwrap().start().unwrap()
}

fn connected_driver(handle: &SimulatorHandle) -> TcpLidarDriver {
    let mut driver = TcpLidarDriver::new(DriverConfig {
        settle_interval: Duration::from_millis(10),
        ..DriverConfig::default()
    });
    let addr = handle.local_addr("front").unwrap();
    driver.connect(&addr.to_string()).unwrap();
    driver
}

fn next_scan(events: &Subscription) -> ScanRecord {
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(DriverEvent::Scan(scan)) => return scan,
            Ok(other) => panic!("unexpected event {:?}", other),
            Err(e) => panic!("no scan within {:?}: {}", WAIT, e),
        }
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_initialize_streams_scans() {
    let handle = start_simulator();
    let mut driver = connected_driver(&handle);
    let events = driver.subscribe_with_capacity(16);
    driver.initialize().unwrap();

    let first = next_scan(&events);
    assert_eq!(first.amount_of_data, 811);
    assert!(first.is_complete());
    assert_eq!(first.angle_begin, -450_000);
    assert_eq!(first.scan_freq, 5000);

    // Room is ±10 m and the sensor sits at its center
    let diagonal = 10.0 * 2f32.sqrt() + 0.02;
    assert!(first.ranges.iter().all(|&r| (0.0..=diagonal).contains(&r)));

    let second = next_scan(&events);
    assert!(second.scan_counter > first.scan_counter);
    assert!(driver.latest_scan().is_some());

    let sensor = handle.simulator().sensor("front").unwrap();
    assert_eq!(sensor.mode(), ScanMode::Scanning);

    driver.disconnect();
    assert!(wait_until(|| sensor.mode() == ScanMode::Idle));
    handle.shutdown();
}

#[test]
fn test_configure_scan_range_changes_sample_count() {
    let handle = start_simulator();
    let mut driver = connected_driver(&handle);
    let events = driver.subscribe_with_capacity(16);
    driver.initialize().unwrap();
    next_scan(&events);

    driver.configure_scan_range(0.0, 90.0).unwrap();

    // floor(90 / 0.333) + 1
    let deadline = Instant::now() + WAIT;
    let scan = loop {
        let scan = next_scan(&events);
        if scan.amount_of_data != 811 || Instant::now() > deadline {
            break scan;
        }
    };
    assert_eq!(scan.amount_of_data, 271);
    assert_eq!(scan.angle_begin, 0);

    let window = handle.simulator().sensor("front").unwrap().window();
    assert_eq!(window.min_angle, 0.0);
    assert_eq!(window.max_angle, 90.0);
}

#[test]
fn test_stop_halts_scans() {
    let handle = start_simulator();
    let mut driver = connected_driver(&handle);
    let events = driver.subscribe_with_capacity(64);
    driver.initialize().unwrap();
    next_scan(&events);

    driver.stop().unwrap();
    let sensor = handle.simulator().sensor("front").unwrap();
    assert!(wait_until(|| sensor.mode() == ScanMode::Idle));

    // Drain anything sent before the stop landed, then expect silence
    thread::sleep(Duration::from_millis(100));
    while events.try_recv().is_ok() {}
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_two_clients_both_receive() {
    let handle = start_simulator();
    let mut a = connected_driver(&handle);
    let mut b = connected_driver(&handle);
    let events_a = a.subscribe_with_capacity(8);
    let events_b = b.subscribe_with_capacity(8);

    let sensor = handle.simulator().sensor("front").unwrap();
    assert!(wait_until(|| sensor.listener_count() == 2));

    a.initialize().unwrap();
    next_scan(&events_a);
    next_scan(&events_b);

    // One client leaving keeps the other streaming
    a.disconnect();
    next_scan(&events_b);
    assert_eq!(sensor.mode(), ScanMode::Scanning);
    b.disconnect();
}

#[test]
fn test_server_closing_publishes_disconnected() {
    let handle = start_simulator();
    let mut driver = connected_driver(&handle);
    let events = driver.subscribe_with_capacity(64);
    driver.initialize().unwrap();
    next_scan(&events);

    handle.shutdown();

    let deadline = Instant::now() + WAIT;
    let mut disconnected = false;
    while Instant::now() < deadline {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(DriverEvent::Disconnected) => {
                disconnected = true;
                break;
            }
            Ok(_) | Err(_) => {}
        }
    }
    assert!(disconnected);
    assert!(!driver.is_connected());
}

/// Raw client: a garbage frame is dropped and the connection keeps working
#[test]
fn test_malformed_frame_keeps_connection() {
    let handle = start_simulator();
    let addr = handle.local_addr("front").unwrap();
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_millis(200))).unwrap();

    stream.write_all(&[STX]).unwrap();
    stream.write_all(b"0010,bogus").unwrap();
    stream.write_all(&[ETX]).unwrap();
    stream.write_all(&encode_command(CMD_SCAN_DATA_CONFIG, None)).unwrap();

    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 1024];
    let deadline = Instant::now() + WAIT;
    let mut reply = None;
    while reply.is_none() && Instant::now() < deadline {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => continue,
        };
        reply = decoder
            .feed(&buf[..n])
            .filter_map(|p| Message::parse(&p).ok())
            .find(|m| m.command() == CMD_SCAN_DATA_CONFIG);
    }

    let reply = reply.unwrap();
    assert_eq!(reply.args()[0], "FFF92230");
    assert_eq!(reply.args()[1], "225510");
}
