//! # Degree Sampling
//!
//! Draws packet degrees from the robust soliton distribution using a
//! cumulative-weight table and a binary search.

use rand::rngs::StdRng;
use rand::{RngExt as _, SeedableRng};

use crate::distribution::robust_soliton;
use crate::error::ConfigError;

/// Random degree generator for an `N`-block message.
pub struct DegreeSampler {
    /// `cumulative[i]` = total weight of degrees `1..=i`; `cumulative[0] = 0`.
    cumulative: Vec<f64>,
    total_weight: f64,
    rng: StdRng,
}

impl DegreeSampler {
    /// Build a sampler for `n` blocks and failure probability `delta`, seeded
    /// from the thread RNG.
    pub fn new(n: usize, delta: f64) -> Result<Self, ConfigError> {
        Self::with_seed(n, delta, rand::rng().random::<u64>())
    }

    /// Build a sampler with a fixed seed for reproducible degree sequences.
    pub fn with_seed(n: usize, delta: f64, seed: u64) -> Result<Self, ConfigError> {
        let weights = robust_soliton(n, delta)?;
        let mut cumulative = Vec::with_capacity(n + 1);
        cumulative.push(0.0);
        let mut total_weight = 0.0;
        for &w in &weights[1..] {
            total_weight += w;
            cumulative.push(total_weight);
        }
        Ok(DegreeSampler {
            cumulative,
            total_weight,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Draw one degree in `1..=N`.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> usize {
        let x = self.rng.random::<f64>() * self.total_weight;
        // Smallest i with x < cumulative[i]. cumulative[0] = 0 <= x, so i >= 1.
        let i = self.cumulative.partition_point(|&c| c <= x);
        i.min(self.max_degree())
    }

    /// Largest degree this sampler can produce (`N`).
    pub fn max_degree(&self) -> usize {
        self.cumulative.len() - 1
    }

    /// Sum of all weights (1.0 up to rounding).
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// The cumulative-weight table, indexed by degree.
    pub fn cumulative_weights(&self) -> &[f64] {
        &self.cumulative
    }
}
