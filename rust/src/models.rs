//! Python-facing summary tree.

use chrono::NaiveDate;
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::simulation::{Interval, OwnSummary, Summary};

// Note: We use std HashMap here for PyO3 interface compatibility

/// One node of a simulation summary. Intervals are `(low, high)` pairs; fields a
/// flavor does not produce are `None`.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummaryNode {
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub days: Option<(f64, f64)>,
    #[pyo3(get)]
    pub calendar_days: Option<(i64, i64)>,
    #[pyo3(get)]
    pub start: Option<(NaiveDate, NaiveDate)>,
    #[pyo3(get)]
    pub end: Option<(NaiveDate, NaiveDate)>,
    /// Proportion of iterations per disposition, deadline schedules only
    #[pyo3(get)]
    pub dispositions: HashMap<String, f64>,
    #[pyo3(get)]
    pub children: Vec<SummaryNode>,
}

fn pair<T: Copy>(interval: &Interval<T>) -> (T, T) {
    (interval.low, interval.high)
}

impl From<&Summary> for SummaryNode {
    fn from(summary: &Summary) -> Self {
        let mut node = SummaryNode {
            name: summary.name.clone(),
            children: summary.children.iter().map(SummaryNode::from).collect(),
            ..SummaryNode::default()
        };

        match &summary.own {
            OwnSummary::Plain(days) => {
                node.days = Some(pair(days));
            }
            OwnSummary::Calendar(own) => {
                node.days = Some(pair(&own.days));
                node.calendar_days = Some(pair(&own.calendar_days));
                node.start = Some(pair(&own.start));
                node.end = Some(pair(&own.end));
            }
            OwnSummary::Deadline(own) => {
                node.days = own.days.as_ref().map(pair);
                node.calendar_days = own.calendar_days.as_ref().map(pair);
                node.start = own.start.as_ref().map(pair);
                node.end = Some(pair(&own.end));
                node.dispositions = own
                    .dispositions
                    .iter()
                    .map(|(disposition, share)| (disposition.to_string(), *share))
                    .collect();
            }
        }
        node
    }
}

#[pymethods]
impl SummaryNode {
    /// Depth-first search for a descendant (or self) by name.
    fn find(&self, name: &str) -> Option<SummaryNode> {
        if self.name == name {
            return Some(self.clone());
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    fn __repr__(&self) -> String {
        format!(
            "SummaryNode(name={:?}, days={:?}, end={:?}, children={})",
            self.name,
            self.days,
            self.end,
            self.children.len()
        )
    }
}
