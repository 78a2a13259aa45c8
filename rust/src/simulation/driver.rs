//! Driver owning the random source for a sequence of runs.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::summary::validate_probability;
use super::{ScheduleNode, SimulationError, StepContext, Summary};
use crate::config::SimulationConfig;
use crate::{log_changes, log_debug};

/// Runs schedules with a configured iteration count, probability and seed.
///
/// Each `Simulation` owns its generator, so independent simulations never
/// share random state.
pub struct Simulation {
    config: SimulationConfig,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        validate_probability(config.probability)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { config, rng })
    }

    /// Step `root` for the configured number of iterations and summarize.
    pub fn run(
        &mut self,
        root: &ScheduleNode,
        ctx: &StepContext<'_>,
    ) -> Result<Summary, SimulationError> {
        let verbosity = self.config.verbosity;
        let ctx = ctx.with_verbosity(verbosity);
        log_changes!(
            verbosity,
            "simulating {:?} ({:?}) for {} iterations",
            root.name(),
            root.flavor(),
            self.config.iterations
        );

        let mut accumulator = root.accumulator();
        for iteration in 0..self.config.iterations {
            let value = root.step(&mut accumulator, &ctx, &mut self.rng)?;
            log_debug!(verbosity, "iteration {}: {:?}", iteration, value);
        }

        let summary = root.summarize(&accumulator, self.config.probability)?;
        log_changes!(verbosity, "{:?}: {:?}", summary.name, summary.own);
        Ok(summary)
    }
}
