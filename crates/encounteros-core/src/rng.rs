//! Random number generator abstraction for determinism.
//!
//! In production, this wraps a real RNG. In tests and replays,
//! a seeded or recorded implementation is injected.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Abstraction over random number generation.
pub trait DeterministicRng: Send + Sync {
    /// Generate a random `u32` in the range `[min, max]` inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;

    /// Generate a random `f64` in `[0.0, 1.0)`.
    fn next_f64(&mut self) -> f64;
}

/// Production RNG seeded from the operating system.
#[derive(Debug)]
pub struct SystemRng(StdRng);

impl SystemRng {
    /// Creates a new RNG seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self(StdRng::from_os_rng())
    }

    /// Creates a reproducible RNG from a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for SystemRng {
    fn default() -> Self {
        Self::new()
    }
}

impl DeterministicRng for SystemRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.0.random_range(min..=max)
    }

    fn next_f64(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}
