//! Injectable jitter for verification confidences.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of symmetric noise added to each method's confidence.
pub trait NoiseSource: Send + Sync {
    /// A sample in `[-amplitude, amplitude]`.
    fn jitter(&self, amplitude: f64) -> f64;
}

/// Always zero. The default, so verification is reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn jitter(&self, _amplitude: f64) -> f64 {
        0.0
    }
}

/// Uniform noise from a seeded generator.
#[derive(Debug)]
pub struct SeededNoise {
    rng: Mutex<StdRng>,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn jitter(&self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen_range(-amplitude..=amplitude)
    }
}
