//! Lidar simulator with ray-casting
//!
//! Scans are generated in the sensor's own local frame: the room walls and
//! the obstacle are transformed into sensor coordinates once per tick, and
//! rays are cast at local angles only. A real device reports no absolute
//! heading, so neither does the simulation.

use super::environment::{Environment, EnvironmentSnapshot, Segment};
use super::noise::NoiseGenerator;
use crate::protocol::fixed::meters_to_mm;
use crate::types::{ScanWindow, SensorPose};

/// Below this the ray is treated as parallel to a wall
const PARALLEL_EPSILON: f32 = 1e-9;

/// Default range reported when nothing is hit (meters)
pub const DEFAULT_MAX_RANGE: f32 = 100.0;

/// Environment geometry expressed in one sensor's local frame
#[derive(Debug, Clone, Copy)]
pub struct LocalScene {
    walls: [Segment; 4],
    obstacle_center: [f32; 2],
    obstacle_radius: f32,
}

impl LocalScene {
    /// Transform the environment into the sensor frame
    ///
    /// Translate by the negative pose position, then rotate by the negative
    /// mounting rotation.
    pub fn new(pose: &SensorPose, env: &EnvironmentSnapshot) -> Self {
        let (sin, cos) = (-pose.rotation.to_radians()).sin_cos();
        let to_local = |p: [f32; 2]| {
            let dx = p[0] - pose.x;
            let dy = p[1] - pose.y;
            [dx * cos - dy * sin, dx * sin + dy * cos]
        };

        let walls = Environment::walls(env.room_half_size)
            .map(|w| Segment::new(to_local(w.a), to_local(w.b)));

        Self {
            walls,
            obstacle_center: to_local(env.obstacle_center),
            obstacle_radius: env.obstacle_radius,
        }
    }

    pub fn obstacle_center(&self) -> [f32; 2] {
        self.obstacle_center
    }
}

/// Ray-casting range sampler
pub struct RayCaster {
    noise: NoiseGenerator,
    noise_amplitude: f32,
    max_range: f32,
}

impl RayCaster {
    /// Create a ray caster
    ///
    /// `noise_amplitude` bounds the symmetric additive range noise (meters).
    pub fn new(noise: NoiseGenerator, noise_amplitude: f32, max_range: f32) -> Self {
        Self {
            noise,
            noise_amplitude,
            max_range,
        }
    }

    /// Generate one range per angular step of `window` (meters)
    pub fn cast(&mut self, scene: &LocalScene, window: &ScanWindow) -> Vec<f32> {
        let count = window.sample_count();
        let mut ranges = Vec::with_capacity(count);

        for i in 0..count {
            let theta = window.angle_at(i).to_radians();
            let distance = trace(scene, theta, self.max_range);
            let noisy = distance + self.noise.symmetric(self.noise_amplitude);
            ranges.push(noisy.max(0.0));
        }

        ranges
    }

    /// Same as [`RayCaster::cast`], quantized to integer millimeters
    pub fn cast_mm(&mut self, scene: &LocalScene, window: &ScanWindow) -> Vec<u32> {
        self.cast(scene, window)
            .into_iter()
            .map(meters_to_mm)
            .collect()
    }

    pub fn max_range(&self) -> f32 {
        self.max_range
    }
}

/// Noise-free distance along local angle `theta` (radians)
pub fn trace(scene: &LocalScene, theta: f32, max_range: f32) -> f32 {
    let (sin, cos) = theta.sin_cos();

    // Nearest wall hit
    let mut distance = max_range;
    for wall in &scene.walls {
        let [ax, ay] = wall.a;
        let dx = wall.b[0] - ax;
        let dy = wall.b[1] - ay;

        let denom = sin * dx - cos * dy;
        if denom.abs() < PARALLEL_EPSILON {
            continue; // Parallel to this wall
        }

        let t = (ay * dx - ax * dy) / denom;
        let s = (cos * ay - sin * ax) / denom;
        if t > 0.0 && (0.0..=1.0).contains(&s) && t < distance {
            distance = t;
        }
    }

    // Obstacle in front of the wall
    let [vx, vy] = scene.obstacle_center;
    let r = scene.obstacle_radius;
    let proj = vx * cos + vy * sin;
    if proj > 0.0 && proj < distance {
        let off = (vx * -sin + vy * cos).abs();
        if off < r {
            distance = proj - (r * r - off * off).sqrt();
        }
    }

    distance
}
