//! # Seeded Random Number Source
//!
//! Every random draw in a compile flows through a single [`Prng`] so that a
//! fixed seed reproduces the output byte-for-byte. The traversal order of the
//! dataset driver defines the draw order; this module only guarantees that
//! each primitive consumes a deterministic amount of generator state.
//!
//! `StdRng` is seeded via `seed_from_u64`, which is stable across platforms
//! for a fixed `rand` version.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Beta, Distribution, Exp, LogNormal, Normal, Poisson};

/// Deterministic pseudo-random number generator for one compilation.
#[derive(Debug)]
pub struct Prng {
    rng: StdRng,
}

impl Prng {
    /// Create a generator with an explicit seed. The same seed always yields
    /// the same draw sequence.
    pub fn seeded(seed: u64) -> Self {
        Prng {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a generator with a non-deterministic seed.
    pub fn from_entropy() -> Self {
        Prng {
            rng: StdRng::from_entropy(),
        }
    }

    /// Next raw 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    /// Uniform float in `[0, 1)`.
    pub fn uniform_float(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform integer in the inclusive range `[lo, hi]`. Bounds are swapped
    /// if given in reverse order.
    pub fn range_int(&mut self, lo: i64, hi: i64) -> i64 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform float in the half-open range `[lo, hi)`. Returns `lo` when the
    /// range is empty.
    pub fn range_float(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..hi)
    }

    /// Pick a uniformly random element. Returns `None` for an empty slice.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.range_int(0, items.len() as i64 - 1) as usize;
        items.get(idx)
    }

    /// Pick an index according to a weight table where `None` entries share
    /// the residual probability `1 - Σw` equally. When every entry is
    /// weighted, the weights are normalized by their total instead.
    ///
    /// Returns 0 for an empty table (callers guard against that case).
    pub fn weighted_index(&mut self, weights: &[Option<f64>]) -> usize {
        if weights.len() <= 1 {
            return 0;
        }

        let explicit: f64 = weights.iter().flatten().filter(|w| **w > 0.0).sum();
        let unweighted = weights.iter().filter(|w| w.is_none()).count();
        let residual = if unweighted > 0 {
            ((1.0 - explicit).max(0.0)) / unweighted as f64
        } else {
            0.0
        };

        let effective: Vec<f64> = weights
            .iter()
            .map(|w| match w {
                Some(w) if *w > 0.0 => *w,
                Some(_) => 0.0,
                None => residual,
            })
            .collect();

        let total: f64 = effective.iter().sum();
        if total <= 0.0 {
            // Degenerate table: fall back to a uniform pick.
            return self.range_int(0, weights.len() as i64 - 1) as usize;
        }

        let mut draw = self.uniform_float() * total;
        for (idx, w) in effective.iter().enumerate() {
            draw -= w;
            if draw < 0.0 {
                return idx;
            }
        }
        weights.len() - 1
    }

    /// Normal sample clamped to `[lo, hi]`.
    pub fn gaussian(&mut self, mean: f64, stddev: f64, lo: f64, hi: f64) -> f64 {
        let sample = match Normal::new(mean, stddev) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        };
        sample.clamp(lo, hi)
    }

    /// Exponential sample (rate `lambda`) clamped to `[lo, hi]`.
    pub fn exponential(&mut self, lambda: f64, lo: f64, hi: f64) -> f64 {
        let sample = match Exp::new(lambda) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => lo,
        };
        sample.clamp(lo, hi)
    }

    /// Poisson sample with mean `lambda`.
    pub fn poisson(&mut self, lambda: f64) -> i64 {
        match Poisson::new(lambda) {
            Ok(dist) => dist.sample(&mut self.rng) as i64,
            Err(_) => 0,
        }
    }

    /// Beta(a, b) sample in `[0, 1]`.
    pub fn beta(&mut self, a: f64, b: f64) -> f64 {
        match Beta::new(a, b) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0.5,
        }
    }

    /// Log-normal sample clamped to `[lo, hi]`.
    pub fn lognormal(&mut self, mu: f64, sigma: f64, lo: f64, hi: f64) -> f64 {
        let sample = match LogNormal::new(mu, sigma) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mu.exp(),
        };
        sample.clamp(lo, hi)
    }
}
