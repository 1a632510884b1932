//! Random draws for arrivals and service durations.
//!
//! The engine never touches an RNG directly; it goes through the [`Sampler`]
//! trait so tests can swap in a [`ScriptedSampler`] and replay exact values.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Exp;

use crate::config::ConfigError;
use crate::types::{RequestKind, Tick};

/// Source of the two kinds of draws the simulation needs.
pub trait Sampler: Send {
    /// A uniform draw in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// A raw (unrounded) draw from the exponential distribution with the given mean.
    fn exponential(&mut self, mean: f64) -> f64;
}

/// Draws a service duration in whole ticks.
///
/// The exponential draw is rounded up; a stage never lasts less than one tick,
/// since a zero-length stage cannot be observed in a tick-stepped model.
pub fn service_ticks(sampler: &mut dyn Sampler, mean: f64) -> Tick {
    let raw = sampler.exponential(mean).ceil();
    if raw.is_finite() && raw >= 1.0 {
        raw as Tick
    } else {
        1
    }
}

/// Seedable sampler backed by ChaCha8.
#[derive(Debug, Clone)]
pub struct RngSampler {
    rng: ChaCha8Rng,
}

impl RngSampler {
    /// Creates a reproducible sampler.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a sampler seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Seeded when `seed` is given, entropy-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl Sampler for RngSampler {
    fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        // Exp is parameterized by rate; a non-positive mean yields no draw and
        // falls back to the one-tick minimum downstream.
        match Exp::new(1.0 / mean) {
            Ok(dist) if mean > 0.0 => self.rng.sample(dist),
            _ => 0.0,
        }
    }
}

/// Replays fixed value sequences, cycling when a sequence runs out.
///
/// An empty uniform sequence yields `0.0`; an empty exponential sequence
/// yields the requested mean.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSampler {
    uniforms: VecDeque<f64>,
    exponentials: VecDeque<f64>,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the values returned by `uniform()`.
    pub fn with_uniforms(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.uniforms = values.into_iter().collect();
        self
    }

    /// Sets the values returned by `exponential()`, regardless of mean.
    pub fn with_exponentials(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.exponentials = values.into_iter().collect();
        self
    }

    fn cycle(values: &mut VecDeque<f64>) -> Option<f64> {
        let value = values.pop_front()?;
        values.push_back(value);
        Some(value)
    }
}

impl Sampler for ScriptedSampler {
    fn uniform(&mut self) -> f64 {
        Self::cycle(&mut self.uniforms).unwrap_or(0.0)
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        Self::cycle(&mut self.exponentials).unwrap_or(mean)
    }
}

/// Maps uniform draws to request kinds through cumulative thresholds.
///
/// Kind `i` owns `[thresholds[i-1], thresholds[i])`; the last kind also owns
/// the closed upper end, so a draw of exactly `1.0` still maps to `Type7`.
#[derive(Clone, Debug, PartialEq)]
pub struct KindDistribution {
    thresholds: [f64; RequestKind::COUNT],
}

impl KindDistribution {
    /// Validates and builds a distribution.
    ///
    /// Thresholds must lie in `[0, 1]`, be non-decreasing, and end at `1.0`.
    /// A threshold equal to its predecessor gives that kind probability zero,
    /// which is how a kind is switched off; a decreasing threshold is rejected.
    pub fn new(thresholds: &[f64]) -> Result<Self, ConfigError> {
        if thresholds.len() != RequestKind::COUNT {
            return Err(ConfigError::Validation(format!(
                "expected {} kind thresholds, got {}",
                RequestKind::COUNT,
                thresholds.len()
            )));
        }

        let mut previous = 0.0;
        for &t in thresholds {
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::Validation(format!(
                    "kind threshold {} outside [0, 1]",
                    t
                )));
            }
            if t < previous {
                return Err(ConfigError::Validation(format!(
                    "kind thresholds must be non-decreasing ({} after {})",
                    t, previous
                )));
            }
            previous = t;
        }

        if (previous - 1.0).abs() > 1e-9 {
            return Err(ConfigError::Validation(format!(
                "kind thresholds must end at 1.0, got {}",
                previous
            )));
        }

        let mut fixed = [0.0; RequestKind::COUNT];
        fixed.copy_from_slice(thresholds);
        Ok(Self { thresholds: fixed })
    }

    /// Maps a uniform value to its request kind.
    pub fn kind_for(&self, u: f64) -> RequestKind {
        RequestKind::ALL
            .iter()
            .zip(self.thresholds.iter())
            .take(RequestKind::COUNT - 1)
            .find(|(_, &t)| u < t)
            .map(|(&kind, _)| kind)
            .unwrap_or(RequestKind::Type7)
    }

    /// Draws a request kind.
    pub fn draw(&self, sampler: &mut dyn Sampler) -> RequestKind {
        self.kind_for(sampler.uniform())
    }

    /// Probability mass assigned to each kind.
    pub fn probabilities(&self) -> [f64; RequestKind::COUNT] {
        let mut probs = [0.0; RequestKind::COUNT];
        let mut previous = 0.0;
        for (p, &t) in probs.iter_mut().zip(self.thresholds.iter()) {
            *p = t - previous;
            previous = t;
        }
        probs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: [f64; 7] = [0.2, 0.3, 0.35, 0.6, 0.75, 0.95, 1.0];

    #[test]
    fn test_reference_thresholds() {
        let dist = KindDistribution::new(&REFERENCE).unwrap();
        assert_eq!(dist.kind_for(0.1), RequestKind::Type1);
        assert_eq!(dist.kind_for(0.25), RequestKind::Type2);
        assert_eq!(dist.kind_for(0.5), RequestKind::Type4);
        assert_eq!(dist.kind_for(0.99), RequestKind::Type7);
    }

    #[test]
    fn test_bucket_edges() {
        let dist = KindDistribution::new(&REFERENCE).unwrap();
        assert_eq!(dist.kind_for(0.0), RequestKind::Type1);
        assert_eq!(dist.kind_for(0.2), RequestKind::Type2);
        assert_eq!(dist.kind_for(0.35), RequestKind::Type4);
        assert_eq!(dist.kind_for(0.95), RequestKind::Type7);
        assert_eq!(dist.kind_for(1.0), RequestKind::Type7);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(KindDistribution::new(&[0.5, 1.0]).is_err());
        assert!(KindDistribution::new(&[0.2, 0.1, 0.35, 0.6, 0.75, 0.95, 1.0]).is_err());
        assert!(KindDistribution::new(&[0.2, 0.3, 0.35, 0.6, 0.75, 0.95, 0.99]).is_err());
        assert!(KindDistribution::new(&[-0.1, 0.3, 0.35, 0.6, 0.75, 0.95, 1.0]).is_err());
    }

    #[test]
    fn test_equal_thresholds_disable_kinds() {
        let dist = KindDistribution::new(&[0.5, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let p = dist.probabilities();
        assert_eq!(p[1], 0.0);
        assert_eq!(p[2], 0.0);
        assert_eq!(p[6], 0.0);
        assert_eq!(dist.kind_for(0.49), RequestKind::Type1);
        assert_eq!(dist.kind_for(0.5), RequestKind::Type4);
        assert_eq!(dist.kind_for(0.999), RequestKind::Type4);

        let single = KindDistribution::new(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(single.kind_for(0.0), RequestKind::Type7);

        let dipping = KindDistribution::new(&[0.5, 0.5, 0.49, 1.0, 1.0, 1.0, 1.0]);
        assert!(matches!(dipping, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let dist = KindDistribution::new(&REFERENCE).unwrap();
        let sum: f64 = dist.probabilities().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((dist.probabilities()[3] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_service_ticks_never_zero() {
        let mut sampler = ScriptedSampler::new().with_exponentials([0.0, 0.3, 2.0, 2.1, -1.0]);
        let drawn: Vec<Tick> = (0..5).map(|_| service_ticks(&mut sampler, 5.0)).collect();
        assert_eq!(drawn, vec![1, 1, 2, 3, 1]);
    }

    #[test]
    fn test_scripted_sampler_cycles() {
        let mut sampler = ScriptedSampler::new().with_uniforms([0.1, 0.9]);
        assert_eq!(sampler.uniform(), 0.1);
        assert_eq!(sampler.uniform(), 0.9);
        assert_eq!(sampler.uniform(), 0.1);
        assert_eq!(sampler.exponential(4.0), 4.0);
    }

    #[test]
    fn test_rng_sampler_reproducible() {
        let mut a = RngSampler::seeded(7);
        let mut b = RngSampler::seeded(7);
        let xs: Vec<f64> = (0..10).map(|_| a.exponential(5.0)).collect();
        let ys: Vec<f64> = (0..10).map(|_| b.exponential(5.0)).collect();
        assert_eq!(xs, ys);

        let mut c = RngSampler::seeded(8);
        let zs: Vec<f64> = (0..10).map(|_| c.exponential(5.0)).collect();
        assert_ne!(xs, zs);
    }

    #[test]
    fn test_rng_sampler_exponential_mean() {
        let mut sampler = RngSampler::seeded(42);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| sampler.exponential(8.0)).sum();
        let mean = total / n as f64;
        assert!((mean - 8.0).abs() < 0.5, "sample mean {} too far from 8", mean);
    }

    #[test]
    fn test_rng_sampler_uniform_range() {
        let mut sampler = RngSampler::seeded(1);
        for _ in 0..1000 {
            let u = sampler.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }
}
