use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::DistributionError;
use crate::models::{Distribution, MAX_AGE, MIN_AGE};

/// Category returned when an axis has no distribution at all. Some precinct
/// profiles legitimately omit axes, so this is not an error.
pub const UNKNOWN: &str = "Unknown";

/// Weighted-categorical sampler over precinct distributions. The RNG is
/// injectable so tests can run fully deterministic draws.
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Draw one category. Weights are normalized before drawing, so a
    /// distribution summing to 0.97 from upstream rounding is fine. An empty
    /// distribution yields `UNKNOWN`; zero or negative total weight is an
    /// error rather than an arbitrary pick.
    pub fn sample(&mut self, dist: &Distribution) -> Result<String, DistributionError> {
        if dist.is_empty() {
            return Ok(UNKNOWN.to_string());
        }
        if let Some((label, _)) = dist.iter().find(|(_, w)| **w < 0.0) {
            return Err(DistributionError::NegativeWeight(label.clone()));
        }
        let total: f64 = dist.values().sum();
        if total <= 0.0 {
            return Err(DistributionError::ZeroWeight);
        }

        // Sort entries so a seeded sampler draws the same sequence every run
        let mut entries: Vec<(&String, f64)> = dist.iter().map(|(k, w)| (k, *w)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let roll = self.rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        for (label, weight) in &entries {
            cumulative += weight;
            if roll < cumulative {
                return Ok((*label).clone());
            }
        }
        // Floating-point edge: roll landed exactly on the total
        Ok(entries[entries.len() - 1].0.clone())
    }

    /// Sample with the degradation policy used during synthesis: a bad
    /// distribution costs one warning and yields "Unknown", never a failure.
    pub fn sample_or_unknown(&mut self, dist: &Distribution, axis: &str) -> String {
        match self.sample(dist) {
            Ok(label) => label,
            Err(e) => {
                warn!("Sampling {} failed ({}); using {}", axis, e, UNKNOWN);
                UNKNOWN.to_string()
            }
        }
    }

    /// Convert an age band label into a concrete age: band midpoint plus a
    /// uniform ±3 year jitter, clamped to the valid persona range.
    pub fn sample_age(&mut self, age_group: &str) -> u8 {
        let midpoint = band_midpoint(age_group);
        let jitter: i32 = self.rng.gen_range(-3..=3);
        (midpoint + jitter).clamp(MIN_AGE as i32, MAX_AGE as i32) as u8
    }

    /// Pick one element uniformly at random.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Pick up to `n` distinct elements, in random order.
    pub fn pick_n<T: Clone>(&mut self, items: &[T], n: usize) -> Vec<T> {
        items
            .choose_multiple(&mut self.rng, n.min(items.len()))
            .cloned()
            .collect()
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn band_midpoint(age_group: &str) -> i32 {
    match age_group.trim() {
        "18-29" => 24,
        "30-39" => 35,
        "40-49" => 45,
        "50-64" => 57,
        "65+" => 72,
        _ => 40,
    }
}
