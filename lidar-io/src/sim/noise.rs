//! Configurable noise generator for simulation
//!
//! Provides bounded uniform noise with deterministic seeding support.

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Uniform};

/// Noise generator with configurable seed for reproducibility
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// Create a new noise generator
    ///
    /// If seed is 0, uses random entropy for non-deterministic behavior.
    /// Otherwise, uses the provided seed for reproducible results.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Generate symmetric uniform noise in [-amplitude, amplitude]
    #[inline]
    pub fn symmetric(&mut self, amplitude: f32) -> f32 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        Uniform::new_inclusive(-amplitude, amplitude).sample(&mut self.rng)
    }
}
