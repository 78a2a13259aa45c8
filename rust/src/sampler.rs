//! Bounded-normal sampling for leaf estimates.
//!
//! A three-point estimate `low-high` is read as a 90% confidence band: the
//! normal distribution is centred on the midpoint with a standard deviation
//! chosen so that 90% of the mass falls between `low` and `high`.

use rand::Rng;
use serde::Serialize;
use std::f64::consts::PI;

use crate::simulation::SimulationError;

/// z-score of the 95th percentile of the standard normal distribution.
///
/// Half of a 90% band spans this many standard deviations on each side of the mean.
pub const Z_90: f64 = 1.644853626951;

/// An atomic task's uncertain duration in ideal working days.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EstimateSpec {
    pub name: String,
    pub low: f64,
    pub high: f64,
    /// Hard floor applied to every draw.
    pub lowest: f64,
    /// Hard ceiling applied to every draw.
    pub highest: f64,
}

impl EstimateSpec {
    /// Create an estimate with no hard floor or ceiling.
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
            lowest: f64::NEG_INFINITY,
            highest: f64::INFINITY,
        }
    }

    /// Clamp every draw into `[lowest, highest]`.
    pub fn with_bounds(mut self, lowest: f64, highest: f64) -> Self {
        self.lowest = lowest;
        self.highest = highest;
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |reason: &str| SimulationError::InvalidEstimate {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(invalid("low and high must be finite"));
        }
        if self.low >= self.high {
            return Err(invalid("low must be strictly less than high"));
        }
        if self.lowest.is_nan() || self.highest.is_nan() || self.lowest > self.highest {
            return Err(invalid("lowest must not exceed highest"));
        }
        Ok(())
    }
}

/// Normal distribution calibrated from an estimate band, clamped to hard bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundedNormal {
    mean: f64,
    stddev: f64,
    lowest: f64,
    highest: f64,
}

impl BoundedNormal {
    pub fn from_spec(spec: &EstimateSpec) -> Result<Self, SimulationError> {
        spec.validate()?;
        let half_width = (spec.high - spec.low) / 2.0;
        Ok(Self {
            mean: spec.low + half_width,
            stddev: half_width / Z_90,
            lowest: spec.lowest,
            highest: spec.highest,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn stddev(&self) -> f64 {
        self.stddev
    }

    /// Draw one value from the distribution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let value = self.mean + self.stddev * standard_normal(rng);
        value.max(self.lowest).min(self.highest)
    }
}

/// Standard normal variate via the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // gen() yields [0, 1); flip it so the logarithm never sees zero
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Endless stream of draws for one estimate over an owned random source.
///
/// A standalone convenience for sampling a single estimate. Schedule trees do
/// not use it: their leaves draw from the generator owned by the run.
#[derive(Clone, Debug)]
pub struct Sampler<R> {
    distribution: BoundedNormal,
    rng: R,
}

impl<R: Rng> Sampler<R> {
    pub fn new(spec: &EstimateSpec, rng: R) -> Result<Self, SimulationError> {
        Ok(Self {
            distribution: BoundedNormal::from_spec(spec)?,
            rng,
        })
    }

    pub fn distribution(&self) -> &BoundedNormal {
        &self.distribution
    }
}

impl<R: Rng> Iterator for Sampler<R> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.distribution.sample(&mut self.rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sorted_draws(spec: &EstimateSpec, n: usize, seed: u64) -> Vec<f64> {
        let sampler = Sampler::new(spec, StdRng::seed_from_u64(seed)).unwrap();
        let mut draws: Vec<f64> = sampler.take(n).collect();
        draws.sort_by(|a, b| a.partial_cmp(b).unwrap());
        draws
    }

    #[test]
    fn test_calibration_parameters() {
        let dist = BoundedNormal::from_spec(&EstimateSpec::new("a", 5.0, 10.0)).unwrap();
        assert!((dist.mean() - 7.5).abs() < 1e-12);
        assert!((dist.stddev() - 2.5 / Z_90).abs() < 1e-12);
    }

    #[test]
    fn test_empirical_band_matches_estimate() {
        let spec = EstimateSpec::new("a", 10.0, 20.0);
        let n = 20_000;
        let draws = sorted_draws(&spec, n, 7);

        let p05 = draws[n * 5 / 100];
        let p95 = draws[n * 95 / 100];
        // Tolerance is 5% of the band width
        assert!((p05 - 10.0).abs() < 0.5, "5th percentile was {}", p05);
        assert!((p95 - 20.0).abs() < 0.5, "95th percentile was {}", p95);
    }

    #[test]
    fn test_draws_are_clamped() {
        let spec = EstimateSpec::new("a", 1.0, 9.0).with_bounds(4.0, 6.0);
        let draws = sorted_draws(&spec, 5_000, 11);
        assert!(draws.iter().all(|&d| (4.0..=6.0).contains(&d)));
        // Band is much wider than the bounds, so both bounds get hit
        assert_eq!(draws.first().copied(), Some(4.0));
        assert_eq!(draws.last().copied(), Some(6.0));
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let spec = EstimateSpec::new("a", 3.0, 8.0);
        let a: Vec<f64> = Sampler::new(&spec, StdRng::seed_from_u64(99))
            .unwrap()
            .take(100)
            .collect();
        let b: Vec<f64> = Sampler::new(&spec, StdRng::seed_from_u64(99))
            .unwrap()
            .take(100)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_estimates_rejected() {
        for spec in [
            EstimateSpec::new("equal", 5.0, 5.0),
            EstimateSpec::new("reversed", 8.0, 3.0),
            EstimateSpec::new("nan", f64::NAN, 3.0),
            EstimateSpec::new("bounds", 1.0, 3.0).with_bounds(5.0, 2.0),
        ] {
            let result = BoundedNormal::from_spec(&spec);
            assert!(
                matches!(result, Err(SimulationError::InvalidEstimate { ref name, .. }) if *name == spec.name),
                "expected {} to be rejected",
                spec.name
            );
        }
    }
}
