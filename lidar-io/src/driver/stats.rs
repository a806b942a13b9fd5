//! Scan throughput statistics

use crate::types::ScanRecord;
use std::time::{Duration, Instant};

/// Frames and points per second over one measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRate {
    pub frames_per_sec: f64,
    pub points_per_sec: f64,
}

/// Counts received scans and reports rates over a sliding window
#[derive(Debug, Clone)]
pub struct ScanStats {
    window_start: Instant,
    window_frames: u64,
    window_points: u64,
    total_frames: u64,
    total_points: u64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            window_start: start,
            window_frames: 0,
            window_points: 0,
            total_frames: 0,
            total_points: 0,
        }
    }

    /// Count one received scan
    pub fn record(&mut self, scan: &ScanRecord) {
        let points = scan.ranges.len() as u64;
        self.window_frames += 1;
        self.window_points += points;
        self.total_frames += 1;
        self.total_points += points;
    }

    /// Rate since the window started
    pub fn rate(&self) -> ScanRate {
        self.rate_at(Instant::now())
    }

    pub fn rate_at(&self, now: Instant) -> ScanRate {
        let secs = now.saturating_duration_since(self.window_start).as_secs_f64();
        if secs <= 0.0 {
            return ScanRate {
                frames_per_sec: 0.0,
                points_per_sec: 0.0,
            };
        }
        ScanRate {
            frames_per_sec: self.window_frames as f64 / secs,
            points_per_sec: self.window_points as f64 / secs,
        }
    }

    /// Report and restart the window once it spans at least `window`
    pub fn poll(&mut self, now: Instant, window: Duration) -> Option<ScanRate> {
        if now.saturating_duration_since(self.window_start) < window {
            return None;
        }
        let rate = self.rate_at(now);
        self.window_start = now;
        self.window_frames = 0;
        self.window_points = 0;
        Some(rate)
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(points: usize) -> ScanRecord {
        ScanRecord {
            ranges: vec![1.0; points],
            amount_of_data: points as u32,
            ..Default::default()
        }
    }

    #[test]
    fn test_rate_over_window() {
        let start = Instant::now();
        let mut stats = ScanStats::starting_at(start);
        for _ in 0..10 {
            stats.record(&scan(811));
        }
        let rate = stats.rate_at(start + Duration::from_secs(2));
        assert!((rate.frames_per_sec - 5.0).abs() < 1e-9);
        assert!((rate.points_per_sec - 4055.0).abs() < 1e-9);
    }

    #[test]
    fn test_poll_resets_window() {
        let start = Instant::now();
        let mut stats = ScanStats::starting_at(start);
        stats.record(&scan(4));

        assert!(stats.poll(start + Duration::from_millis(500), Duration::from_secs(1)).is_none());

        let rate = stats
            .poll(start + Duration::from_secs(1), Duration::from_secs(1))
            .unwrap();
        assert!((rate.frames_per_sec - 1.0).abs() < 1e-9);

        let rate = stats.rate_at(start + Duration::from_secs(2));
        assert_eq!(rate.frames_per_sec, 0.0);
        assert_eq!(stats.total_frames(), 1);
        assert_eq!(stats.total_points(), 4);
    }

    #[test]
    fn test_zero_elapsed() {
        let start = Instant::now();
        let stats = ScanStats::starting_at(start);
        assert_eq!(stats.rate_at(start).frames_per_sec, 0.0);
    }
}
