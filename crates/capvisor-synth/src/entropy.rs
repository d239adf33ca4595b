// SPDX-License-Identifier: Apache-2.0

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Source of the pseudo-random values used for fallback heat and placeholder scores.
pub trait RandomSource: Send + Sync + 'static {
    fn next_u64(&self) -> u64;

    /// Uniform value in `0..bound`; a zero bound yields zero.
    fn below(&self, bound: u64) -> u64;
}

fn uniform_below<R: Rng + ?Sized>(rng: &mut R, bound: u64) -> u64 {
    if bound == 0 {
        0
    } else {
        rng.random_range(0..bound)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u64(&self) -> u64 {
        rand::rng().random()
    }

    fn below(&self, bound: u64) -> u64 {
        uniform_below(&mut rand::rng(), bound)
    }
}

/// Reproducible sequence for tests and replays.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_u64(&self) -> u64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random()
    }

    fn below(&self, bound: u64) -> u64 {
        uniform_below(
            &mut *self.rng.lock().unwrap_or_else(PoisonError::into_inner),
            bound,
        )
    }
}
