//! Monte Carlo simulation of work-breakdown trees.
//!
//! Every node follows the same protocol: `accumulator()` builds an empty
//! accumulator shaped like the node, `step()` produces one iteration's value
//! (stepping children first) and appends it, and `summarize()` reduces the
//! accumulated values into confidence intervals. How a node steps and combines
//! depends on its [`Flavor`], which selects one strategy object:
//!
//! - `Plain`: ideal days only (sum / max / min)
//! - `Calendar`: threads start dates through children and places work on a calendar
//! - `Deadline`: calendar placement plus a due date and a completion disposition

mod calendar;
mod deadline;
mod driver;
mod plain;
mod summary;

use chrono::NaiveDate;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;

use crate::calendar::Calendar;
use crate::sampler::{BoundedNormal, EstimateSpec};

pub use calendar::CalendarStep;
pub use deadline::{DeadlineStep, Disposition};
pub use driver::Simulation;
pub use plain::combine_days;
pub use summary::{
    categorical, confidence_interval, CalendarSummary, DeadlineSummary, Interval, OwnSummary,
    Summary, DEFAULT_PROBABILITY,
};

/// Errors that can occur while building, stepping or summarizing a schedule.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid estimate {name:?}: {reason}")]
    InvalidEstimate { name: String, reason: String },
    #[error("Composite {0:?} has no children")]
    EmptyComposite(String),
    #[error("Composite {name:?} mixes {expected:?} and {found:?} children")]
    MixedFlavors {
        name: String,
        expected: Flavor,
        found: Flavor,
    },
    #[error("{composition:?} is not supported for {flavor:?} schedules")]
    UnsupportedComposition {
        composition: Composition,
        flavor: Flavor,
    },
    #[error("Confidence probability must be in (0, 1], got {0}")]
    InvalidProbability(f64),
    #[error("Step context is missing {0}")]
    MissingContext(&'static str),
    #[error("Expected a {expected:?} step value")]
    FlavorMismatch { expected: Flavor },
    #[error("Accumulator does not match the shape of {0:?}")]
    AccumulatorShape(String),
    #[error("Cannot summarize zero samples")]
    EmptySample,
    #[error("{days} working days after {start} is outside the supported date range")]
    DateOverflow { start: NaiveDate, days: i64 },
}

/// Which capabilities a schedule tree has beyond being named.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Flavor {
    /// Ideal days only.
    Plain,
    /// Calendar aware: start and end dates on a working calendar.
    Calendar,
    /// Calendar and deadline aware.
    Deadline,
}

impl Flavor {
    pub fn is_calendar_aware(self) -> bool {
        matches!(self, Flavor::Calendar | Flavor::Deadline)
    }

    pub fn is_deadline_aware(self) -> bool {
        matches!(self, Flavor::Deadline)
    }

    fn strategy(self) -> &'static dyn Strategy {
        match self {
            Flavor::Plain => &plain::PlainStrategy,
            Flavor::Calendar => &calendar::CalendarStrategy,
            Flavor::Deadline => &deadline::DeadlineStrategy,
        }
    }
}

/// How a composite combines its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Composition {
    /// Children run one after another.
    Sequence,
    /// Children run concurrently and all must finish.
    Parallel,
    /// Children race; the first to finish wins. Plain schedules only.
    OneOf,
}

/// Values threaded down the tree on every step.
///
/// Each layer reads the fields it needs and forwards the rest, overriding
/// `start` or `due_date` for its children where the composition requires it.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepContext<'a> {
    pub start: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub calendar: Option<&'a Calendar>,
    pub verbosity: u8,
}

impl<'a> StepContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(self, start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            ..self
        }
    }

    pub fn with_due_date(self, due_date: NaiveDate) -> Self {
        Self {
            due_date: Some(due_date),
            ..self
        }
    }

    pub fn with_calendar(self, calendar: &'a Calendar) -> Self {
        Self {
            calendar: Some(calendar),
            ..self
        }
    }

    pub fn with_verbosity(self, verbosity: u8) -> Self {
        Self { verbosity, ..self }
    }

    fn require_start(&self) -> Result<NaiveDate, SimulationError> {
        self.start.ok_or(SimulationError::MissingContext("start"))
    }

    fn require_due_date(&self) -> Result<NaiveDate, SimulationError> {
        self.due_date.ok_or(SimulationError::MissingContext("due_date"))
    }

    fn require_calendar(&self) -> Result<&'a Calendar, SimulationError> {
        self.calendar.ok_or(SimulationError::MissingContext("calendar"))
    }
}

/// One iteration's outcome for one node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepValue {
    Plain(f64),
    Calendar(CalendarStep),
    Deadline(DeadlineStep),
}

impl StepValue {
    /// Ideal days worked, when defined.
    pub fn days(&self) -> Option<f64> {
        match self {
            StepValue::Plain(days) => Some(*days),
            StepValue::Calendar(step) => Some(step.days),
            StepValue::Deadline(step) => step.days,
        }
    }

    fn into_plain(self) -> Result<f64, SimulationError> {
        match self {
            StepValue::Plain(days) => Ok(days),
            _ => Err(SimulationError::FlavorMismatch {
                expected: Flavor::Plain,
            }),
        }
    }

    fn into_calendar(self) -> Result<CalendarStep, SimulationError> {
        match self {
            StepValue::Calendar(step) => Ok(step),
            _ => Err(SimulationError::FlavorMismatch {
                expected: Flavor::Calendar,
            }),
        }
    }

    fn into_deadline(self) -> Result<DeadlineStep, SimulationError> {
        match self {
            StepValue::Deadline(step) => Ok(step),
            _ => Err(SimulationError::FlavorMismatch {
                expected: Flavor::Deadline,
            }),
        }
    }
}

/// Per-node record of every value stepped so far, mirroring the schedule tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Accumulator {
    own: Vec<StepValue>,
    children: Vec<Accumulator>,
}

impl Accumulator {
    pub fn own(&self) -> &[StepValue] {
        &self.own
    }

    pub fn children(&self) -> &[Accumulator] {
        &self.children
    }

    /// Number of iterations recorded for this node.
    pub fn len(&self) -> usize {
        self.own.len()
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_empty()
    }

    /// Drop every value past `len` throughout the tree.
    fn truncate(&mut self, len: usize) {
        self.own.truncate(len);
        for child in &mut self.children {
            child.truncate(len);
        }
    }

    /// Append `other` node by node. Shapes must already have been checked.
    fn absorb(&mut self, other: Accumulator) {
        self.own.extend(other.own);
        for (child, other_child) in self.children.iter_mut().zip(other.children) {
            child.absorb(other_child);
        }
    }
}

/// Per-flavor stepping, combination and summarization.
trait Strategy: Sync {
    fn step_estimate(
        &self,
        distribution: &BoundedNormal,
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<StepValue, SimulationError>;

    fn step_children(
        &self,
        composition: Composition,
        children: &[ScheduleNode],
        accumulators: &mut [Accumulator],
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<StepValue>, SimulationError>;

    fn combine(
        &self,
        composition: Composition,
        values: &[StepValue],
    ) -> Result<StepValue, SimulationError>;

    fn summarize(
        &self,
        values: &[StepValue],
        probability: f64,
    ) -> Result<OwnSummary, SimulationError>;
}

/// Step every child independently with the same context.
fn step_each(
    children: &[ScheduleNode],
    accumulators: &mut [Accumulator],
    ctx: &StepContext<'_>,
    rng: &mut dyn RngCore,
) -> Result<Vec<StepValue>, SimulationError> {
    let mut values = Vec::with_capacity(children.len());
    for (child, acc) in children.iter().zip(accumulators.iter_mut()) {
        values.push(child.step(acc, ctx, rng)?);
    }
    Ok(values)
}

#[derive(Clone, Debug, PartialEq)]
enum NodeKind {
    Estimate(BoundedNormal),
    Composite {
        composition: Composition,
        children: Vec<ScheduleNode>,
    },
}

/// A leaf estimate or a composite of child nodes. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleNode {
    name: String,
    flavor: Flavor,
    kind: NodeKind,
}

impl ScheduleNode {
    /// Build a leaf from a validated estimate.
    pub fn estimate(flavor: Flavor, spec: &EstimateSpec) -> Result<Self, SimulationError> {
        Ok(Self {
            name: spec.name.clone(),
            flavor,
            kind: NodeKind::Estimate(BoundedNormal::from_spec(spec)?),
        })
    }

    /// Build a composite. The flavor is taken from the children, which must all agree.
    pub fn composite(
        composition: Composition,
        name: impl Into<String>,
        children: Vec<ScheduleNode>,
    ) -> Result<Self, SimulationError> {
        let name = name.into();
        let flavor = match children.first() {
            Some(first) => first.flavor,
            None => return Err(SimulationError::EmptyComposite(name)),
        };

        if let Some(other) = children.iter().find(|c| c.flavor != flavor) {
            return Err(SimulationError::MixedFlavors {
                name,
                expected: flavor,
                found: other.flavor,
            });
        }

        // Racing children has no calendar or deadline semantics
        if composition == Composition::OneOf && flavor != Flavor::Plain {
            return Err(SimulationError::UnsupportedComposition {
                composition,
                flavor,
            });
        }

        Ok(Self {
            name,
            flavor,
            kind: NodeKind::Composite {
                composition,
                children,
            },
        })
    }

    pub fn sequence(
        name: impl Into<String>,
        children: Vec<ScheduleNode>,
    ) -> Result<Self, SimulationError> {
        Self::composite(Composition::Sequence, name, children)
    }

    pub fn parallel(
        name: impl Into<String>,
        children: Vec<ScheduleNode>,
    ) -> Result<Self, SimulationError> {
        Self::composite(Composition::Parallel, name, children)
    }

    pub fn one_of(
        name: impl Into<String>,
        children: Vec<ScheduleNode>,
    ) -> Result<Self, SimulationError> {
        Self::composite(Composition::OneOf, name, children)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// The composition of a composite, `None` for leaves.
    pub fn composition(&self) -> Option<Composition> {
        match &self.kind {
            NodeKind::Estimate(_) => None,
            NodeKind::Composite { composition, .. } => Some(*composition),
        }
    }

    pub fn children(&self) -> &[ScheduleNode] {
        match &self.kind {
            NodeKind::Estimate(_) => &[],
            NodeKind::Composite { children, .. } => children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Estimate(_))
    }

    /// Fresh, empty accumulator shaped like this node.
    pub fn accumulator(&self) -> Accumulator {
        Accumulator {
            own: Vec::new(),
            children: self.children().iter().map(Self::accumulator).collect(),
        }
    }

    /// Produce one iteration's value and append it to `accumulator`.
    ///
    /// On error the accumulator is left exactly as it was before the call.
    pub fn step(
        &self,
        accumulator: &mut Accumulator,
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<StepValue, SimulationError> {
        // Every node of an accumulator holds the same number of values
        let recorded = accumulator.len();
        let result = self.record_step(accumulator, ctx, rng);
        if result.is_err() {
            accumulator.truncate(recorded);
        }
        result
    }

    fn record_step(
        &self,
        accumulator: &mut Accumulator,
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<StepValue, SimulationError> {
        let strategy = self.flavor.strategy();
        let value = match &self.kind {
            NodeKind::Estimate(distribution) => strategy.step_estimate(distribution, ctx, rng)?,
            NodeKind::Composite {
                composition,
                children,
            } => {
                if accumulator.children.len() != children.len() {
                    return Err(SimulationError::AccumulatorShape(self.name.clone()));
                }
                let values = strategy.step_children(
                    *composition,
                    children,
                    &mut accumulator.children,
                    ctx,
                    rng,
                )?;
                strategy.combine(*composition, &values)?
            }
        };
        accumulator.own.push(value);
        Ok(value)
    }

    /// Reduce an accumulator into a summary tree.
    pub fn summarize(
        &self,
        accumulator: &Accumulator,
        probability: f64,
    ) -> Result<Summary, SimulationError> {
        let children = self.children();
        if accumulator.children.len() != children.len() {
            return Err(SimulationError::AccumulatorShape(self.name.clone()));
        }

        let own = self.flavor.strategy().summarize(&accumulator.own, probability)?;
        let child_summaries = children
            .iter()
            .zip(&accumulator.children)
            .map(|(child, acc)| child.summarize(acc, probability))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Summary {
            name: self.name.clone(),
            own,
            children: child_summaries,
        })
    }

    /// Append the raw values of `other` into `target`, node by node.
    ///
    /// Lets independent workers, each with its own generator and accumulator,
    /// pool their iterations before a single `summarize`. Both accumulators are
    /// checked against this tree before `target` is touched.
    pub fn merge_accumulators(
        &self,
        target: &mut Accumulator,
        other: Accumulator,
    ) -> Result<(), SimulationError> {
        self.check_shape(target)?;
        self.check_shape(&other)?;
        target.absorb(other);
        Ok(())
    }

    fn check_shape(&self, accumulator: &Accumulator) -> Result<(), SimulationError> {
        let children = self.children();
        if accumulator.children.len() != children.len() {
            return Err(SimulationError::AccumulatorShape(self.name.clone()));
        }
        children
            .iter()
            .zip(&accumulator.children)
            .try_for_each(|(child, acc)| child.check_shape(acc))
    }

    /// Step `iterations` times and summarize at the default 90% probability.
    pub fn run(
        &self,
        iterations: usize,
        ctx: &StepContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Summary, SimulationError> {
        let mut accumulator = self.accumulator();
        for _ in 0..iterations {
            self.step(&mut accumulator, ctx, rng)?;
        }
        self.summarize(&accumulator, DEFAULT_PROBABILITY)
    }
}
