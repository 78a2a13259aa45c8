//! Ideal-day composition without calendar semantics.

use rand::RngCore;

use super::summary::confidence_interval;
use super::{
    step_each, Accumulator, Composition, OwnSummary, ScheduleNode, SimulationError, StepContext,
    StepValue, Strategy,
};
use crate::sampler::BoundedNormal;

/// Combine child durations: total for a sequence, slowest for parallel work,
/// fastest for a race.
pub fn combine_days(composition: Composition, values: &[f64]) -> f64 {
    match composition {
        Composition::Sequence => values.iter().sum(),
        Composition::Parallel => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Composition::OneOf => values.iter().copied().fold(f64::INFINITY, f64::min),
    }
}

pub(super) struct PlainStrategy;

impl Strategy for PlainStrategy {
    fn step_estimate(
        &self,
        distribution: &BoundedNormal,
        _ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<StepValue, SimulationError> {
        Ok(StepValue::Plain(distribution.sample(rng)))
    }

    fn step_children(
        &self,
        _composition: Composition,
        children: &[ScheduleNode],
        accumulators: &mut [Accumulator],
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<StepValue>, SimulationError> {
        step_each(children, accumulators, ctx, rng)
    }

    fn combine(
        &self,
        composition: Composition,
        values: &[StepValue],
    ) -> Result<StepValue, SimulationError> {
        let days = values
            .iter()
            .map(|v| v.into_plain())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StepValue::Plain(combine_days(composition, &days)))
    }

    fn summarize(
        &self,
        values: &[StepValue],
        probability: f64,
    ) -> Result<OwnSummary, SimulationError> {
        let days = values
            .iter()
            .map(|v| v.into_plain())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OwnSummary::Plain(confidence_interval(&days, probability)?))
    }
}
