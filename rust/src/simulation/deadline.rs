//! Deadline-aware composition.
//!
//! Extends calendar placement with a due date. Every step is classified as
//! COMPLETE (finished by the due date), INCOMPLETE (work stopped at the due
//! date) or NOT_STARTED (the due date had passed before the task could begin).

use chrono::NaiveDate;
use rand::RngCore;
use serde::Serialize;
use std::fmt;

use super::calendar::calendar_step;
use super::summary::{categorical, confidence_interval, optional_interval};
use super::{
    step_each, Accumulator, Composition, DeadlineSummary, Flavor, OwnSummary, ScheduleNode,
    SimulationError, StepContext, StepValue, Strategy,
};
use crate::sampler::BoundedNormal;
use crate::{log_checks, log_debug};

/// Tri-state completion classification of a deadline-aware step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    NotStarted,
    Incomplete,
    Complete,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::NotStarted => "NOT_STARTED",
            Disposition::Incomplete => "INCOMPLETE",
            Disposition::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One iteration of a deadline-aware node.
///
/// When NOT_STARTED only `end` is meaningful: it is the date the task would
/// have started had the due date not already passed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DeadlineStep {
    pub disposition: Disposition,
    pub days: Option<f64>,
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl DeadlineStep {
    pub fn not_started(end: NaiveDate) -> Self {
        Self {
            disposition: Disposition::NotStarted,
            days: None,
            start: None,
            end,
        }
    }

    /// Ran out of time; `end` is when work stopped.
    pub fn incomplete(days: f64, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            disposition: Disposition::Incomplete,
            days: Some(days),
            start: Some(start),
            end,
        }
    }

    pub fn complete(days: f64, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            disposition: Disposition::Complete,
            days: Some(days),
            start: Some(start),
            end,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.disposition == Disposition::Complete
    }

    /// Elapsed calendar days, undefined when the task never started.
    pub fn calendar_days(&self) -> Option<i64> {
        self.start.map(|start| (self.end - start).num_days())
    }
}

pub(super) struct DeadlineStrategy;

impl DeadlineStrategy {
    fn step_sequence(
        &self,
        children: &[ScheduleNode],
        accumulators: &mut [Accumulator],
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<StepValue>, SimulationError> {
        let due_date = ctx.require_due_date()?;
        let mut next_start = ctx.require_start()?;
        let mut values = Vec::with_capacity(children.len());

        for (index, (child, acc)) in children.iter().zip(accumulators.iter_mut()).enumerate() {
            let value = child.step(acc, &ctx.with_start(next_start), rng)?;
            let step = value.into_deadline()?;

            // A start on the due date guarantees every later sibling is NOT_STARTED
            next_start = if step.is_complete() {
                step.end
            } else {
                if next_start < due_date && index + 1 < children.len() {
                    log_checks!(
                        ctx.verbosity,
                        "{} ended {} on {}; later siblings will not start",
                        child.name(),
                        step.disposition,
                        step.end
                    );
                }
                due_date
            };
            values.push(value);
        }
        Ok(values)
    }

    fn step_parallel(
        &self,
        children: &[ScheduleNode],
        accumulators: &mut [Accumulator],
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<StepValue>, SimulationError> {
        let due_date = ctx.require_due_date()?;

        // Trial pass into throwaway accumulators to see which children would miss
        let mut scratch: Vec<Accumulator> =
            children.iter().map(ScheduleNode::accumulator).collect();
        let trial = step_each(children, &mut scratch, ctx, rng)?;

        let mut tightened: Option<NaiveDate> = None;
        for value in trial {
            let step = value.into_deadline()?;
            if !step.is_complete() {
                tightened = Some(tightened.map_or(step.end, |d| d.min(step.end)));
            }
        }

        // Everyone is cut off the moment the first child misses
        let effective_due = tightened.unwrap_or(due_date);
        log_debug!(
            ctx.verbosity,
            "parallel due date {} tightened to {}",
            due_date,
            effective_due
        );
        step_each(children, accumulators, &ctx.with_due_date(effective_due), rng)
    }
}

impl Strategy for DeadlineStrategy {
    fn step_estimate(
        &self,
        distribution: &BoundedNormal,
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<StepValue, SimulationError> {
        let start = ctx.require_start()?;
        let due_date = ctx.require_due_date()?;

        let step = if start >= due_date {
            DeadlineStep::not_started(start)
        } else {
            let placed = calendar_step(distribution, ctx, rng)?;
            if placed.end > due_date {
                DeadlineStep::incomplete(placed.days, start, due_date)
            } else {
                DeadlineStep::complete(placed.days, placed.start, placed.end)
            }
        };
        Ok(StepValue::Deadline(step))
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
            Composition::Sequence => self.step_sequence(children, accumulators, ctx, rng),
            Composition::Parallel => self.step_parallel(children, accumulators, ctx, rng),
            Composition::OneOf => Err(SimulationError::UnsupportedComposition {
                composition,
                flavor: Flavor::Deadline,
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
            .map(|v| v.into_deadline())
            .collect::<Result<Vec<_>, _>>()?;
        let Some(first) = steps.first() else {
            return Err(SimulationError::EmptySample);
        };

        let combined = match composition {
            Composition::Sequence => combine_sequence(first, &steps),
            Composition::Parallel => combine_parallel(first, &steps),
            Composition::OneOf => {
                return Err(SimulationError::UnsupportedComposition {
                    composition,
                    flavor: Flavor::Deadline,
                })
            }
        };
        Ok(StepValue::Deadline(combined))
    }

    fn summarize(
        &self,
        values: &[StepValue],
        probability: f64,
    ) -> Result<OwnSummary, SimulationError> {
        let steps = values
            .iter()
            .map(|v| v.into_deadline())
            .collect::<Result<Vec<_>, _>>()?;
        let ends: Vec<NaiveDate> = steps.iter().map(|s| s.end).collect();

        Ok(OwnSummary::Deadline(DeadlineSummary {
            days: optional_interval(steps.iter().map(|s| s.days), probability)?,
            calendar_days: optional_interval(
                steps.iter().map(DeadlineStep::calendar_days),
                probability,
            )?,
            start: optional_interval(steps.iter().map(|s| s.start), probability)?,
            end: confidence_interval(&ends, probability)?,
            dispositions: categorical(steps.iter().map(|s| s.disposition)),
        }))
    }
}

fn combine_sequence(first: &DeadlineStep, steps: &[DeadlineStep]) -> DeadlineStep {
    let Some(start) = first.start else {
        return DeadlineStep::not_started(first.end);
    };

    let days: f64 = steps.iter().filter_map(|s| s.days).sum();
    match steps.iter().find(|s| !s.is_complete()) {
        None => {
            let end = steps.last().map_or(first.end, |s| s.end);
            DeadlineStep::complete(days, start, end)
        }
        Some(missed) => DeadlineStep::incomplete(days, start, missed.end),
    }
}

fn combine_parallel(first: &DeadlineStep, steps: &[DeadlineStep]) -> DeadlineStep {
    if steps.iter().all(|s| s.disposition == Disposition::NotStarted) {
        return DeadlineStep::not_started(first.end);
    }

    let days = steps
        .iter()
        .filter_map(|s| s.days)
        .fold(f64::NEG_INFINITY, f64::max);
    // At least one child started, so some start is defined
    let start = steps.iter().find_map(|s| s.start).unwrap_or(first.end);
    let end = steps.iter().map(|s| s.end).max().unwrap_or(first.end);

    if steps.iter().all(DeadlineStep::is_complete) {
        DeadlineStep::complete(days, start, end)
    } else {
        DeadlineStep::incomplete(days, start, end)
    }
}
