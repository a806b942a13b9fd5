//! Simulated room with an orbiting obstacle
//!
//! The room is a square centered on the origin. A single circular obstacle
//! orbits the origin; its angular position (`phase`) lives in an
//! [`EnvironmentClock`] shared by every simulated sensor so that all sensors
//! observe the same obstacle at the same tick.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Moving circular obstacle
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ObstacleConfig {
    /// Obstacle radius (meters)
    #[serde(default = "default_obstacle_radius")]
    pub radius: f32,
    /// Distance of the obstacle center from the room center (meters)
    #[serde(default = "default_orbit_radius")]
    pub orbit_radius: f32,
}

fn default_obstacle_radius() -> f32 {
    0.5
}
fn default_orbit_radius() -> f32 {
    4.0
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            radius: default_obstacle_radius(),
            orbit_radius: default_orbit_radius(),
        }
    }
}

/// Static environment geometry
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Environment {
    /// Half of the room's side length (meters)
    #[serde(default = "default_room_half_size")]
    pub room_half_size: f32,
    #[serde(default)]
    pub obstacle: ObstacleConfig,
}

fn default_room_half_size() -> f32 {
    10.0
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            room_half_size: default_room_half_size(),
            obstacle: ObstacleConfig::default(),
        }
    }
}

impl Environment {
    /// Freeze the geometry at a given obstacle phase
    pub fn snapshot(&self, phase: f64) -> EnvironmentSnapshot {
        let orbit = self.obstacle.orbit_radius as f64;
        EnvironmentSnapshot {
            room_half_size: self.room_half_size,
            obstacle_center: [(phase.cos() * orbit) as f32, (phase.sin() * orbit) as f32],
            obstacle_radius: self.obstacle.radius,
        }
    }

    /// Room boundary as four segments (counter-clockwise corners)
    pub fn walls(half_size: f32) -> [Segment; 4] {
        let h = half_size;
        let corners = [[-h, -h], [h, -h], [h, h], [-h, h]];
        [
            Segment::new(corners[0], corners[1]),
            Segment::new(corners[1], corners[2]),
            Segment::new(corners[2], corners[3]),
            Segment::new(corners[3], corners[0]),
        ]
    }
}

/// Environment state at one instant, in room coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentSnapshot {
    pub room_half_size: f32,
    pub obstacle_center: [f32; 2],
    pub obstacle_radius: f32,
}

/// Line segment from `a` to `b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a: [f32; 2],
    pub b: [f32; 2],
}

impl Segment {
    pub fn new(a: [f32; 2], b: [f32; 2]) -> Self {
        Self { a, b }
    }
}

/// Shared obstacle phase (radians), advanced by a fixed step per tick
///
/// Stored as f64 bits in an atomic so sensors can read it without locking.
pub struct EnvironmentClock {
    phase_bits: AtomicU64,
    step: f64,
}

impl EnvironmentClock {
    pub fn new(initial_phase: f64, step: f64) -> Self {
        Self {
            phase_bits: AtomicU64::new(initial_phase.to_bits()),
            step,
        }
    }

    /// Current phase in radians
    pub fn phase(&self) -> f64 {
        f64::from_bits(self.phase_bits.load(Ordering::Acquire))
    }

    /// Advance by one step, wrapping to [0, 2π), and return the new phase
    pub fn advance(&self) -> f64 {
        let next = (self.phase() + self.step).rem_euclid(std::f64::consts::TAU);
        self.phase_bits.store(next.to_bits(), Ordering::Release);
        next
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}
