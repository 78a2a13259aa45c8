//! Calendar-aware composition: ideal days placed on a working calendar.

use chrono::NaiveDate;
use rand::RngCore;
use serde::Serialize;

use super::summary::confidence_interval;
use super::{
    step_each, Accumulator, CalendarSummary, Composition, Flavor, OwnSummary, ScheduleNode,
    SimulationError, StepContext, StepValue, Strategy,
};
use crate::calendar::whole_workdays;
use crate::sampler::BoundedNormal;

/// One iteration of a calendar-aware node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CalendarStep {
    /// Ideal working days.
    pub days: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CalendarStep {
    pub fn new(days: f64, start: NaiveDate, end: NaiveDate) -> Self {
        Self { days, start, end }
    }

    /// Elapsed calendar days between start and end.
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Sample a leaf and place it on the calendar from the context's start date.
pub(super) fn calendar_step(
    distribution: &BoundedNormal,
    ctx: &StepContext<'_>,
    rng: &mut dyn RngCore,
) -> Result<CalendarStep, SimulationError> {
    let start = ctx.require_start()?;
    let calendar = ctx.require_calendar()?;
    let days = distribution.sample(rng);
    let end = calendar.n_workdays_after(start, whole_workdays(days))?;
    Ok(CalendarStep::new(days, start, end))
}

pub(super) struct CalendarStrategy;

impl Strategy for CalendarStrategy {
    fn step_estimate(
        &self,
        distribution: &BoundedNormal,
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<StepValue, SimulationError> {
        calendar_step(distribution, ctx, rng).map(StepValue::Calendar)
    }

    fn step_children(
        &self,
        composition: Composition,
        children: &[ScheduleNode],
        accumulators: &mut [Accumulator],
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<StepValue>, SimulationError> {
        match composition {
            Composition::Sequence => {
                // Each child starts when the previous one ends
                let mut next_start = ctx.require_start()?;
                let mut values = Vec::with_capacity(children.len());
                for (child, acc) in children.iter().zip(accumulators.iter_mut()) {
                    let value = child.step(acc, &ctx.with_start(next_start), rng)?;
                    next_start = value.into_calendar()?.end;
                    values.push(value);
                }
                Ok(values)
            }
            Composition::Parallel => step_each(children, accumulators, ctx, rng),
            Composition::OneOf => Err(SimulationError::UnsupportedComposition {
                composition,
                flavor: Flavor::Calendar,
            }),
        }
    }

    fn combine(
        &self,
        composition: Composition,
        values: &[StepValue],
    ) -> Result<StepValue, SimulationError> {
        let steps = values
            .iter()
            .map(|v| v.into_calendar())
            .collect::<Result<Vec<_>, _>>()?;
        let (first, last) = match (steps.first(), steps.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SimulationError::EmptySample),
        };

        let combined = match composition {
            Composition::Sequence => {
                CalendarStep::new(steps.iter().map(|s| s.days).sum(), first.start, last.end)
            }
            Composition::Parallel => {
                let days = steps.iter().map(|s| s.days).fold(f64::NEG_INFINITY, f64::max);
                let end = steps.iter().map(|s| s.end).max().unwrap_or(first.end);
                CalendarStep::new(days, first.start, end)
            }
            Composition::OneOf => {
                return Err(SimulationError::UnsupportedComposition {
                    composition,
                    flavor: Flavor::Calendar,
                })
            }
        };
        Ok(StepValue::Calendar(combined))
    }

    fn summarize(
        &self,
        values: &[StepValue],
        probability: f64,
    ) -> Result<OwnSummary, SimulationError> {
        let steps = values
            .iter()
            .map(|v| v.into_calendar())
            .collect::<Result<Vec<_>, _>>()?;

        let days: Vec<f64> = steps.iter().map(|s| s.days).collect();
        let calendar_days: Vec<i64> = steps.iter().map(CalendarStep::calendar_days).collect();
        let starts: Vec<NaiveDate> = steps.iter().map(|s| s.start).collect();
        let ends: Vec<NaiveDate> = steps.iter().map(|s| s.end).collect();

        Ok(OwnSummary::Calendar(CalendarSummary {
            days: confidence_interval(&days, probability)?,
            calendar_days: confidence_interval(&calendar_days, probability)?,
            start: confidence_interval(&starts, probability)?,
            end: confidence_interval(&ends, probability)?,
        }))
    }
}
