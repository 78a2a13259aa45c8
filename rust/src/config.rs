//! Configuration types for the simulation engine.

use pyo3::prelude::*;

use crate::logging::VERBOSITY_SILENT;

/// Configuration for a Monte Carlo run.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Number of simulated iterations (must be at least 1 to summarize)
    #[pyo3(get, set)]
    pub iterations: usize,
    /// Probability mass covered by each summary interval, in (0, 1]
    #[pyo3(get, set)]
    pub probability: f64,
    /// Seed for the random source; None draws one from the OS
    #[pyo3(get, set)]
    pub seed: Option<u64>,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            probability: 0.9,
            seed: None,
            verbosity: VERBOSITY_SILENT,
        }
    }
}

#[pymethods]
impl SimulationConfig {
    #[new]
    #[pyo3(signature = (iterations=None, probability=None, seed=None, verbosity=None))]
    fn new(
        iterations: Option<usize>,
        probability: Option<f64>,
        seed: Option<u64>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            iterations: iterations.unwrap_or(defaults.iterations),
            probability: probability.unwrap_or(defaults.probability),
            seed,
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SimulationConfig(iterations={}, probability={}, seed={:?}, verbosity={})",
            self.iterations, self.probability, self.seed, self.verbosity
        )
    }
}
