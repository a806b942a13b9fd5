//! Sensor placement and scan window

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Sensor mounting pose in the room frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct SensorPose {
    /// X position (meters)
    #[serde(default)]
    pub x: f32,
    /// Y position (meters)
    #[serde(default)]
    pub y: f32,
    /// Mounting rotation (degrees, CCW)
    #[serde(default)]
    pub rotation: f32,
}

impl SensorPose {
    pub fn new(x: f32, y: f32, rotation: f32) -> Self {
        Self { x, y, rotation }
    }
}

/// Angular range and step of a scan, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ScanWindow {
    pub min_angle: f32,
    pub max_angle: f32,
    pub resolution: f32,
}

impl ScanWindow {
    /// Upper bound on samples per scan
    pub const MAX_SAMPLES: usize = 65_536;

    /// Create a window, validating it
    pub fn new(min_angle: f32, max_angle: f32, resolution: f32) -> Result<Self> {
        let window = Self {
            min_angle,
            max_angle,
            resolution,
        };
        window.validate()?;
        Ok(window)
    }

    /// Reject non-positive resolution, empty/inverted ranges and windows
    /// with more than [`Self::MAX_SAMPLES`] samples
    pub fn validate(&self) -> Result<()> {
        if self.resolution.is_nan() || self.resolution <= 0.0 {
            return Err(Error::Config(format!(
                "scan resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.min_angle.is_nan() || self.max_angle.is_nan() || self.min_angle >= self.max_angle {
            return Err(Error::Config(format!(
                "scan window min {} must be below max {}",
                self.min_angle, self.max_angle
            )));
        }
        let steps = self.steps();
        if steps.is_nan() || steps >= Self::MAX_SAMPLES as f32 {
            return Err(Error::Config(format!(
                "scan window [{}, {}] step {} exceeds {} samples",
                self.min_angle,
                self.max_angle,
                self.resolution,
                Self::MAX_SAMPLES
            )));
        }
        Ok(())
    }

    /// Number of samples: floor((max - min) / resolution) + 1
    ///
    /// Capped at [`Self::MAX_SAMPLES`] for windows that skipped validation.
    pub fn sample_count(&self) -> usize {
        let steps = self.steps();
        if steps.is_nan() || steps <= 0.0 {
            return 1;
        }
        (steps as usize).min(Self::MAX_SAMPLES - 1) + 1
    }

    fn steps(&self) -> f32 {
        ((self.max_angle - self.min_angle) / self.resolution).floor()
    }

    /// Local angle of sample `index` in degrees
    #[inline]
    pub fn angle_at(&self, index: usize) -> f32 {
        self.min_angle + index as f32 * self.resolution
    }
}

impl Default for ScanWindow {
    /// 270° field of view at one third of a degree
    fn default() -> Self {
        Self {
            min_angle: -45.0,
            max_angle: 225.0,
            resolution: 0.333,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sample_count() {
        assert_eq!(ScanWindow::default().sample_count(), 811);
    }

    #[test]
    fn test_validation() {
        assert!(ScanWindow::new(-45.0, 225.0, 0.5).is_ok());
        assert!(matches!(
            ScanWindow::new(0.0, 90.0, 0.0),
            Err(Error::Config(_))
        ));
        assert!(ScanWindow::new(0.0, 90.0, -1.0).is_err());
        assert!(ScanWindow::new(90.0, 90.0, 1.0).is_err());
        assert!(ScanWindow::new(100.0, 10.0, 1.0).is_err());
        assert!(ScanWindow::new(0.0, 10.0, f32::NAN).is_err());
        assert!(ScanWindow::new(f32::NEG_INFINITY, f32::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_sample_count_bounded() {
        // Full signed fixed-point span at 0.0001° would be 2^32 + 1 samples
        let huge = ScanWindow::new(-214_748.36, 214_748.36, 0.0001);
        assert!(matches!(huge, Err(Error::Config(_))));
        assert!(matches!(
            ScanWindow::new(0.0, 1.0, 1e-40),
            Err(Error::Config(_))
        ));

        let unchecked = ScanWindow {
            min_angle: 0.0,
            max_angle: 1.0,
            resolution: 1e-40,
        };
        assert_eq!(unchecked.sample_count(), ScanWindow::MAX_SAMPLES);

        let widest = ScanWindow::new(0.0, 32_767.5, 0.5).unwrap();
        assert_eq!(widest.sample_count(), ScanWindow::MAX_SAMPLES);
        assert!(ScanWindow::new(0.0, 32_768.0, 0.5).is_err());
    }

    #[test]
    fn test_angle_at() {
        let window = ScanWindow::new(-10.0, 10.0, 0.5).unwrap();
        assert_eq!(window.sample_count(), 41);
        assert_eq!(window.angle_at(0), -10.0);
        assert_eq!(window.angle_at(40), 10.0);
    }
}
