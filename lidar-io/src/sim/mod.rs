//! Multi-sensor rangefinder simulator
//!
//! A [`Simulator`] owns a registry of [`SimulatedSensor`]s keyed by id and a
//! shared [`EnvironmentClock`]. One simulation thread ticks at a fixed rate:
//! it advances the obstacle phase once, takes a snapshot of the environment,
//! and lets every scanning sensor cast and broadcast against that snapshot.
//!
//! ```text
//! tick thread ──► clock.advance() ──► snapshot ──► sensor.broadcast() ──► listener queues
//! accept thread (per sensor) ──► connection threads ──► sensor.handle_message()
//! ```

pub mod environment;
pub mod noise;
pub mod raycast;
pub mod sensor;
pub mod server;

pub use environment::{Environment, EnvironmentClock, EnvironmentSnapshot};
pub use raycast::{LocalScene, RayCaster};
pub use sensor::{Listener, ScanMode, SimulatedSensor};
pub use server::SensorServer;

use crate::config::SimulatorConfig;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Sensor registry plus shared environment
pub struct Simulator {
    config: SimulatorConfig,
    clock: EnvironmentClock,
    sensors: BTreeMap<String, Arc<SimulatedSensor>>,
}

impl Simulator {
    /// Build all sensors from a validated configuration
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;

        let settings = &config.simulation;
        let mut sensors = BTreeMap::new();
        for (index, sensor_config) in config.sensors.iter().enumerate() {
            // Distinct but reproducible noise per sensor
            let seed = match settings.random_seed {
                0 => 0,
                seed => seed.wrapping_add(index as u64),
            };
            let sensor = SimulatedSensor::new(sensor_config, settings, seed);
            sensors.insert(sensor_config.id.clone(), Arc::new(sensor));
        }

        let clock = EnvironmentClock::new(settings.initial_phase, settings.phase_step);
        log::info!(
            "Simulator: {} sensors, room ±{} m, tick {} Hz",
            sensors.len(),
            config.environment.room_half_size,
            settings.tick_hz
        );

        Ok(Self {
            config,
            clock,
            sensors,
        })
    }

    /// Look up a sensor by id
    pub fn sensor(&self, id: &str) -> Result<Arc<SimulatedSensor>> {
        self.sensors
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownSensor(id.to_string()))
    }

    pub fn sensors(&self) -> impl Iterator<Item = &Arc<SimulatedSensor>> {
        self.sensors.values()
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn clock(&self) -> &EnvironmentClock {
        &self.clock
    }

    /// Environment at the current phase
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        self.config.environment.snapshot(self.clock.phase())
    }

    /// Advance the obstacle and broadcast one scan per scanning sensor
    ///
    /// Returns the total number of frames queued.
    pub fn tick(&self) -> usize {
        self.clock.advance();
        let snapshot = self.snapshot();
        self.sensors
            .values()
            .map(|sensor| sensor.broadcast(&snapshot))
            .sum()
    }

    /// Bind every sensor and start the accept and tick threads
    pub fn start(self) -> Result<SimulatorHandle> {
        let simulator = Arc::new(self);
        let running = Arc::new(AtomicBool::new(true));
        let mut threads = Vec::new();
        let mut addresses = BTreeMap::new();

        // Bind all sensors before spawning any thread
        let mut servers = Vec::with_capacity(simulator.sensors.len());
        for sensor in simulator.sensors.values() {
            let server = SensorServer::bind(
                Arc::clone(sensor),
                simulator.config.protocol.clone(),
                simulator.config.simulation.outbound_queue,
            )?;
            addresses.insert(sensor.id().to_string(), server.local_addr()?);
            servers.push(server);
        }
        for server in servers {
            match server.spawn(Arc::clone(&running)) {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    running.store(false, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }

        let sim = Arc::clone(&simulator);
        let tick_running = Arc::clone(&running);
        match thread::Builder::new()
            .name("sim-tick".to_string())
            .spawn(move || simulation_loop(&sim, &tick_running))
        {
            Ok(handle) => threads.push(handle),
            Err(e) => {
                running.store(false, Ordering::Relaxed);
                return Err(Error::Other(format!("Failed to spawn simulation thread: {}", e)));
            }
        }

        Ok(SimulatorHandle {
            simulator,
            running,
            addresses,
            threads,
        })
    }
}

fn simulation_loop(simulator: &Simulator, running: &AtomicBool) {
    let interval = simulator.config.simulation.tick_interval();
    log::info!("Simulation loop started: interval={:?}", interval);

    while running.load(Ordering::Relaxed) {
        let loop_start = Instant::now();
        simulator.tick();

        let elapsed = loop_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        } else {
            log::debug!("Tick overran: {:?} > {:?}", elapsed, interval);
        }
    }

    log::info!("Simulation loop stopped");
}

/// Running simulator; stops and joins its threads on drop
pub struct SimulatorHandle {
    simulator: Arc<Simulator>,
    running: Arc<AtomicBool>,
    addresses: BTreeMap<String, SocketAddr>,
    threads: Vec<JoinHandle<()>>,
}

impl SimulatorHandle {
    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Bound address of a sensor's server
    pub fn local_addr(&self, id: &str) -> Result<SocketAddr> {
        self.addresses
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownSensor(id.to_string()))
    }

    /// Flag shared with every simulator thread
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stop all threads and wait for them
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("Simulator thread panicked");
            }
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
