//! Confidence-interval reduction of accumulated step values.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::hash::Hash;

use super::deadline::Disposition;
use super::SimulationError;

/// Probability covered by a summary interval unless configured otherwise.
pub const DEFAULT_PROBABILITY: f64 = 0.9;

/// A `[low, high]` band of simulated outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Interval<T> {
    pub low: T,
    pub high: T,
}

/// Summary of a calendar-aware node's own values.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalendarSummary {
    pub days: Interval<f64>,
    pub calendar_days: Interval<i64>,
    pub start: Interval<NaiveDate>,
    pub end: Interval<NaiveDate>,
}

/// Summary of a deadline-aware node's own values.
///
/// Fields that no iteration defined (every run NOT_STARTED) have no interval.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeadlineSummary {
    pub days: Option<Interval<f64>>,
    pub calendar_days: Option<Interval<i64>>,
    pub start: Option<Interval<NaiveDate>>,
    pub end: Interval<NaiveDate>,
    /// Share of iterations ending in each disposition; dispositions never seen are absent.
    pub dispositions: FxHashMap<Disposition, f64>,
}

impl DeadlineSummary {
    /// Share of iterations with `disposition`, zero when never observed.
    pub fn proportion(&self, disposition: Disposition) -> f64 {
        self.dispositions.get(&disposition).copied().unwrap_or(0.0)
    }
}

/// A node's summary of its own accumulated values.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OwnSummary {
    Plain(Interval<f64>),
    Calendar(CalendarSummary),
    Deadline(DeadlineSummary),
}

impl OwnSummary {
    pub fn as_plain(&self) -> Option<&Interval<f64>> {
        match self {
            OwnSummary::Plain(interval) => Some(interval),
            _ => None,
        }
    }

    pub fn as_calendar(&self) -> Option<&CalendarSummary> {
        match self {
            OwnSummary::Calendar(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn as_deadline(&self) -> Option<&DeadlineSummary> {
        match self {
            OwnSummary::Deadline(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Summary tree mirroring the schedule tree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub name: String,
    pub own: OwnSummary,
    pub children: Vec<Summary>,
}

impl Summary {
    /// Depth-first search for the first node called `name`.
    pub fn find(&self, name: &str) -> Option<&Summary> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

pub(super) fn validate_probability(probability: f64) -> Result<(), SimulationError> {
    if probability > 0.0 && probability <= 1.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidProbability(probability))
    }
}

/// `floor` that tolerates representation error, e.g. `100 * (1 - 0.9) / 2`
/// evaluating to 4.999999999999999.
fn floor_index(position: f64) -> usize {
    (position + 1e-9).floor() as usize
}

/// Central interval containing `probability` of `values`.
///
/// Sorts a copy ascending and takes the values at `floor(n * (1 - p) / 2)` and
/// `floor(n - n * (1 - p) / 2)`, the latter clamped to the last index.
pub fn confidence_interval<T: PartialOrd + Copy>(
    values: &[T],
    probability: f64,
) -> Result<Interval<T>, SimulationError> {
    validate_probability(probability)?;
    if values.is_empty() {
        return Err(SimulationError::EmptySample);
    }

    let mut ordered = values.to_vec();
    ordered.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let size = ordered.len() as f64;
    let outside = size * (1.0 - probability) / 2.0;
    let last = ordered.len() - 1;
    let low = floor_index(outside).min(last);
    let high = floor_index(size - outside).min(last);

    Ok(Interval {
        low: ordered[low],
        high: ordered[high],
    })
}

/// Interval over whichever values are defined, `None` if none are.
pub(super) fn optional_interval<T: PartialOrd + Copy>(
    values: impl IntoIterator<Item = Option<T>>,
    probability: f64,
) -> Result<Option<Interval<T>>, SimulationError> {
    let defined: Vec<T> = values.into_iter().flatten().collect();
    if defined.is_empty() {
        return Ok(None);
    }
    confidence_interval(&defined, probability).map(Some)
}

/// Proportion of each distinct value.
pub fn categorical<K: Eq + Hash>(values: impl IntoIterator<Item = K>) -> FxHashMap<K, f64> {
    let mut counts: FxHashMap<K, usize> = FxHashMap::default();
    let mut total = 0usize;
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(k, count)| (k, count as f64 / total as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_interval_indices() {
        let values: Vec<i64> = (0..100).collect();
        let interval = confidence_interval(&values, 0.9).unwrap();
        // floor(100 * 0.05) = 5, floor(100 - 5) = 95
        assert_eq!(interval, Interval { low: 5, high: 95 });
    }

    #[test]
    fn test_small_sample_bounds() {
        let interval = confidence_interval(&[7.0], 0.9).unwrap();
        assert_eq!(interval, Interval { low: 7.0, high: 7.0 });

        let values: Vec<i64> = (0..10).rev().collect();
        assert_eq!(
            confidence_interval(&values, 0.9).unwrap(),
            Interval { low: 0, high: 9 }
        );
    }

    #[test]
    fn test_full_probability_clamps_to_extremes() {
        let values = [3.0, 1.0, 2.0];
        assert_eq!(
            confidence_interval(&values, 1.0).unwrap(),
            Interval { low: 1.0, high: 3.0 }
        );
    }

    #[test]
    fn test_interval_over_dates() {
        let dates: Vec<NaiveDate> = (1..=20)
            .map(|d| NaiveDate::from_ymd_opt(2020, 7, d).unwrap())
            .collect();
        let interval = confidence_interval(&dates, 0.9).unwrap();
        // floor(20 * 0.05) = 1, floor(20 - 1) = 19
        assert_eq!(interval.low, NaiveDate::from_ymd_opt(2020, 7, 2).unwrap());
        assert_eq!(interval.high, NaiveDate::from_ymd_opt(2020, 7, 20).unwrap());
    }

    #[test]
    fn test_empty_sample_is_error() {
        let empty: [f64; 0] = [];
        assert_eq!(
            confidence_interval(&empty, 0.9),
            Err(SimulationError::EmptySample)
        );
    }

    #[test]
    fn test_invalid_probability() {
        for p in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                confidence_interval(&[1.0, 2.0], p),
                Err(SimulationError::InvalidProbability(_))
            ));
        }
    }

    #[test]
    fn test_optional_interval_skips_missing() {
        let values = [None, Some(4.0), None, Some(2.0)];
        let interval = optional_interval(values, 0.9).unwrap();
        assert_eq!(interval, Some(Interval { low: 2.0, high: 4.0 }));

        let none: [Option<f64>; 2] = [None, None];
        assert_eq!(optional_interval(none, 0.9).unwrap(), None);
    }

    #[test]
    fn test_categorical_proportions() {
        let props = categorical([
            Disposition::Complete,
            Disposition::Complete,
            Disposition::Incomplete,
            Disposition::Complete,
        ]);
        assert_eq!(props.len(), 2);
        assert!((props[&Disposition::Complete] - 0.75).abs() < 1e-12);
        assert!((props[&Disposition::Incomplete] - 0.25).abs() < 1e-12);
        assert!(!props.contains_key(&Disposition::NotStarted));
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let date = |d| NaiveDate::from_ymd_opt(2020, 7, d).unwrap();
        let mut dispositions = FxHashMap::default();
        dispositions.insert(Disposition::Complete, 1.0);
        let summary = Summary {
            name: "root".to_string(),
            own: OwnSummary::Deadline(DeadlineSummary {
                days: Some(Interval { low: 2.0, high: 4.0 }),
                calendar_days: Some(Interval { low: 2, high: 6 }),
                start: Some(Interval {
                    low: date(1),
                    high: date(1),
                }),
                end: Interval {
                    low: date(3),
                    high: date(7),
                },
                dispositions,
            }),
            children: vec![Summary {
                name: "leaf".to_string(),
                own: OwnSummary::Plain(Interval { low: 1.0, high: 3.0 }),
                children: vec![],
            }],
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["name"], "root");
        assert_eq!(json["own"]["end"]["high"], "2020-07-07");
        assert_eq!(json["own"]["dispositions"]["COMPLETE"], 1.0);
        assert_eq!(json["children"][0]["own"]["low"], 1.0);
    }

    proptest! {
        #[test]
        fn prop_interval_ignores_input_order(
            mut values in prop::collection::vec(-1.0e6f64..1.0e6, 1..200),
            p in 0.01f64..=1.0,
        ) {
            let forward = confidence_interval(&values, p).unwrap();
            values.reverse();
            let reversed = confidence_interval(&values, p).unwrap();
            values.sort_by(|a, b| b.partial_cmp(a).unwrap());
            let descending = confidence_interval(&values, p).unwrap();

            prop_assert_eq!(forward, reversed);
            prop_assert_eq!(forward, descending);
            prop_assert!(forward.low <= forward.high);
        }

        #[test]
        fn prop_categorical_sums_to_one(values in prop::collection::vec(0u8..4, 1..100)) {
            let total: f64 = categorical(values).values().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
        }
    }
}
