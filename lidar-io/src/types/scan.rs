//! Lidar scan types

use crate::protocol::constants::ANGLE_SCALE;

/// One decoded (or simulated) scan telegram
///
/// Angles are kept in their fixed-point wire form (degrees × 10000).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanRecord {
    /// Running scan number
    pub scan_counter: u32,
    /// Scan frequency (Hz × 100)
    pub scan_freq: u32,
    /// Measurement frequency (samples per second)
    pub meas_freq: u32,
    /// First sample angle, signed (degrees × 10000)
    pub angle_begin: i32,
    /// Angular step (degrees × 10000)
    pub angle_resol: u32,
    /// Declared sample count
    pub amount_of_data: u32,
    /// Distances in meters
    pub ranges: Vec<f32>,
    /// Raw signal strengths (empty when not transmitted)
    pub rssi: Vec<f32>,
}

impl ScanRecord {
    /// First sample angle in degrees
    pub fn angle_begin_deg(&self) -> f32 {
        self.angle_begin as f32 / ANGLE_SCALE
    }

    /// Angular step in degrees
    pub fn angle_resol_deg(&self) -> f32 {
        self.angle_resol as f32 / ANGLE_SCALE
    }

    /// Angle of sample `index` in degrees
    pub fn angle_at(&self, index: usize) -> f32 {
        (self.angle_begin as f64 + index as f64 * self.angle_resol as f64) as f32 / ANGLE_SCALE
    }

    /// Whether every declared sample was received
    pub fn is_complete(&self) -> bool {
        self.ranges.len() == self.amount_of_data as usize
    }

    /// Convert to Cartesian points (x, y) in the sensor frame
    pub fn to_cartesian(&self) -> Vec<(f32, f32)> {
        self.ranges
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                let a = self.angle_at(i).to_radians();
                (r * a.cos(), r * a.sin())
            })
            .collect()
    }
}
