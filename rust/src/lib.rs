//! Monte Carlo schedule estimation.
//!
//! Work breakdowns are trees of leaf estimates (a 90% `low-high` range in ideal
//! days) combined in sequence, in parallel, or as a race. Simulating a tree many
//! times yields confidence intervals for every node: ideal days for plain
//! schedules, start and end dates on a working calendar for calendar-aware
//! schedules, and completion dispositions against a due date for
//! deadline-aware schedules.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

pub mod calendar;
mod config;
pub mod logging;
mod models;
pub mod outline;
pub mod sampler;
pub mod simulation;

pub use calendar::Calendar;
pub use config::SimulationConfig;
pub use models::SummaryNode;
pub use outline::{Outline, OutlineError, OutlineNode};
pub use sampler::{BoundedNormal, EstimateSpec, Sampler};
pub use simulation::{
    Composition, Flavor, ScheduleNode, Simulation, SimulationError, StepContext, Summary,
};

const ROOT_NAME: &str = "Schedule";

/// Parse an outline and simulate it.
///
/// The arguments choose the schedule flavor:
/// * no `start` - plain ideal days
/// * `start` - calendar-aware, skipping weekends and `days_off`
/// * `start` and `due_date` - deadline-aware
///
/// # Raises
/// * ValueError for malformed outlines, invalid estimates, or a due date without a start
#[pyfunction]
#[pyo3(signature = (schedule, config, start=None, due_date=None, days_off=None))]
fn simulate(
    schedule: &str,
    config: SimulationConfig,
    start: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    days_off: Option<Vec<NaiveDate>>,
) -> PyResult<SummaryNode> {
    let flavor = match (start, due_date) {
        (None, None) => Flavor::Plain,
        (Some(_), None) => Flavor::Calendar,
        (Some(_), Some(_)) => Flavor::Deadline,
        (None, Some(_)) => {
            return Err(PyValueError::new_err("due_date requires a start date"));
        }
    };

    let outline = Outline::parse(schedule).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let root = outline
        .to_schedule(flavor, ROOT_NAME)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let calendar = Calendar::new(days_off.unwrap_or_default());
    let mut ctx = StepContext::new().with_calendar(&calendar);
    if let Some(start) = start {
        ctx = ctx.with_start(start);
    }
    if let Some(due_date) = due_date {
        ctx = ctx.with_due_date(due_date);
    }

    let summary = Simulation::new(config)
        .and_then(|mut sim| sim.run(&root, &ctx))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(SummaryNode::from(&summary))
}

/// Python module definition.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<SimulationConfig>()?;
    m.add_class::<SummaryNode>()?;

    m.add_function(wrap_pyfunction!(simulate, m)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTLINE: &str = "\
+ Design: 2-4
+ Build
  | Backend: 5-10
  | Frontend: 4-8
";

    fn config() -> SimulationConfig {
        SimulationConfig {
            iterations: 500,
            seed: Some(9),
            ..SimulationConfig::default()
        }
    }

    fn make_date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_simulate_plain() {
        let node = simulate(OUTLINE, config(), None, None, None).unwrap();
        assert_eq!(node.name, ROOT_NAME);
        assert!(node.days.is_some());
        assert!(node.end.is_none());
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn test_simulate_calendar() {
        let start = make_date(2020, 6, 29);
        let days_off = vec![make_date(2020, 7, 3)];
        let node = simulate(OUTLINE, config(), Some(start), None, Some(days_off)).unwrap();
        assert_eq!(node.start, Some((start, start)));
        assert!(node.dispositions.is_empty());
    }

    #[test]
    fn test_simulate_deadline() {
        let start = make_date(2020, 6, 29);
        let due = make_date(2020, 7, 10);
        let node = simulate(OUTLINE, config(), Some(start), Some(due), None).unwrap();
        assert!(!node.dispositions.is_empty());
        let (_, latest_end) = node.end.unwrap();
        assert!(latest_end <= due);
    }

    #[test]
    fn test_simulate_rejects_dates_out_of_range() {
        let start = make_date(2020, 6, 29);
        let result = simulate("+ big: 100000000-200000000\n", config(), Some(start), None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_simulate_rejects_due_date_without_start() {
        let due = make_date(2020, 7, 10);
        assert!(simulate(OUTLINE, config(), None, Some(due), None).is_err());
    }
}
