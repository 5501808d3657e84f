//! Random sampling for phase durations and brightness.
//!
//! The engine draws every random value through [`Sampler`] so previews can
//! run on a real RNG while tests use deterministic samplers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform samples over an inclusive range.
pub trait Sampler {
    /// Uniform sample from `[min, max]`, both inclusive.
    ///
    /// Returns `min` when `min >= max`, which is how a degenerate range
    /// (that validation should have rejected) collapses.
    fn sample(&mut self, min: u64, max: u64) -> u64;

    /// Sample a brightness level from `[min, max]`.
    fn sample_brightness(&mut self, min: u8, max: u8) -> u8 {
        let level = self.sample(u64::from(min), u64::from(max));
        u8::try_from(level).unwrap_or(u8::MAX)
    }
}

impl<S: Sampler + ?Sized> Sampler for &mut S {
    fn sample(&mut self, min: u64, max: u64) -> u64 {
        (**self).sample(min, max)
    }
}

/// [`Sampler`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandSampler<R = StdRng> {
    rng: R,
}

impl RandSampler<StdRng> {
    /// Sampler seeded from operating system entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sampler, used for repeatable previews.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RandSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Sampler for RandSampler<R> {
    fn sample(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }
}
