//! Indentation-based text outlines of a work breakdown.
//!
//! ```text
//! # comments and blank lines are ignored
//! + Design
//!   | API: 2-4
//!   | Storage: 3-6
//! + Build: 10-20
//! ```
//!
//! Every line starts with an operator and a space. The operator of a node's first
//! child decides how the node combines its children: `+` runs them in sequence,
//! `|` in parallel. Lines without children are leaves of the form `name: low-high`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::sampler::EstimateSpec;
use crate::simulation::{Flavor, ScheduleNode, SimulationError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutlineError {
    #[error("Outline has no entries")]
    Empty,
    #[error("Line {line}: expected '+ ' or '| ' at the start of {text:?}")]
    UnrecognizedOperator { line: usize, text: String },
    #[error("Line {line}: leaf {name:?} needs an estimate like 'name: low-high'")]
    MissingEstimate { line: usize, name: String },
    #[error("Line {line}: cannot read estimate {estimate:?}")]
    InvalidEstimate { line: usize, estimate: String },
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    /// `+`
    Sequence,
    /// `|`
    Parallel,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Sequence => '+',
            Operator::Parallel => '|',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutlineNode {
    Leaf {
        name: String,
        low: f64,
        high: f64,
    },
    /// `name` is `None` only for the root.
    Tree {
        name: Option<String>,
        operator: Operator,
        children: Vec<OutlineNode>,
    },
}

impl OutlineNode {
    pub fn name(&self) -> Option<&str> {
        match self {
            OutlineNode::Leaf { name, .. } => Some(name),
            OutlineNode::Tree { name, .. } => name.as_deref(),
        }
    }

    /// Bottom-up transform: leaves get `None`, trees get their transformed children.
    pub fn map<T, F>(&self, f: &mut F) -> T
    where
        F: FnMut(&OutlineNode, Option<Vec<T>>) -> T,
    {
        match self {
            OutlineNode::Leaf { .. } => f(self, None),
            OutlineNode::Tree { children, .. } => {
                let mapped = children.iter().map(|c| c.map(&mut *f)).collect();
                f(self, Some(mapped))
            }
        }
    }

    /// Fallible form of [`OutlineNode::map`]; stops at the first error.
    pub fn try_map<T, E, F>(&self, f: &mut F) -> Result<T, E>
    where
        F: FnMut(&OutlineNode, Option<Vec<T>>) -> Result<T, E>,
    {
        match self {
            OutlineNode::Leaf { .. } => f(self, None),
            OutlineNode::Tree { children, .. } => {
                let mapped = children
                    .iter()
                    .map(|c| c.try_map(&mut *f))
                    .collect::<Result<Vec<_>, _>>()?;
                f(self, Some(mapped))
            }
        }
    }

    fn write_indented(
        &self,
        out: &mut fmt::Formatter<'_>,
        depth: usize,
        op: char,
    ) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            OutlineNode::Leaf { name, low, high } => {
                writeln!(out, "{}{} {}: {}-{}", pad, op, name, low, high)
            }
            OutlineNode::Tree {
                name,
                operator,
                children,
            } => {
                let child_depth = match name {
                    Some(name) => {
                        writeln!(out, "{}{} {}", pad, op, name)?;
                        depth + 1
                    }
                    None => depth,
                };
                for child in children {
                    child.write_indented(out, child_depth, operator.symbol())?;
                }
                Ok(())
            }
        }
    }
}

/// A parsed outline. The root is an unnamed tree holding the top-level lines.
#[derive(Clone, Debug, PartialEq)]
pub struct Outline {
    root: OutlineNode,
}

struct Line<'a> {
    number: usize,
    indent: usize,
    text: &'a str,
}

impl Outline {
    pub fn parse(text: &str) -> Result<Self, OutlineError> {
        let lines: Vec<Line<'_>> = text
            .lines()
            .enumerate()
            .filter(|(_, raw)| {
                let trimmed = raw.trim();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .map(|(index, raw)| {
                let raw = raw.trim_end();
                let text = raw.trim_start();
                Line {
                    number: index + 1,
                    indent: raw.len() - text.len(),
                    text,
                }
            })
            .collect();

        let children = parse_group(&lines)?;
        let root = tree(None, children).ok_or(OutlineError::Empty)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &OutlineNode {
        &self.root
    }

    pub fn map<T, F>(&self, mut f: F) -> T
    where
        F: FnMut(&OutlineNode, Option<Vec<T>>) -> T,
    {
        self.root.map(&mut f)
    }

    pub fn try_map<T, E, F>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut(&OutlineNode, Option<Vec<T>>) -> Result<T, E>,
    {
        self.root.try_map(&mut f)
    }

    /// Build a schedule of the given flavor; the unnamed root takes `root_name`.
    pub fn to_schedule(
        &self,
        flavor: Flavor,
        root_name: &str,
    ) -> Result<ScheduleNode, OutlineError> {
        self.try_map(|node, children| -> Result<ScheduleNode, OutlineError> {
            let built = match (node, children) {
                (OutlineNode::Leaf { name, low, high }, _) => {
                    ScheduleNode::estimate(flavor, &EstimateSpec::new(name.as_str(), *low, *high))?
                }
                (OutlineNode::Tree { name, operator, .. }, children) => {
                    let name = name.as_deref().unwrap_or(root_name);
                    let children = children.unwrap_or_default();
                    match operator {
                        Operator::Sequence => ScheduleNode::sequence(name, children)?,
                        Operator::Parallel => ScheduleNode::parallel(name, children)?,
                    }
                }
            };
            Ok(built)
        })
    }
}

impl FromStr for Outline {
    type Err = OutlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Outline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.write_indented(f, 0, Operator::Sequence.symbol())
    }
}

/// Parse sibling lines; each line owns the following lines indented deeper than it.
fn parse_group(lines: &[Line<'_>]) -> Result<Vec<(Operator, OutlineNode)>, OutlineError> {
    let mut nodes = Vec::new();
    let mut s = 0;
    while s < lines.len() {
        let head = &lines[s];
        let end = lines[s + 1..]
            .iter()
            .position(|l| l.indent <= head.indent)
            .map_or(lines.len(), |p| s + 1 + p);
        nodes.push(parse_line(head, &lines[s + 1..end])?);
        s = end;
    }
    Ok(nodes)
}

fn parse_line(
    head: &Line<'_>,
    body: &[Line<'_>],
) -> Result<(Operator, OutlineNode), OutlineError> {
    let mut chars = head.text.chars();
    let operator = match chars.next() {
        Some('+') => Operator::Sequence,
        Some('|') => Operator::Parallel,
        _ => return Err(unrecognized(head)),
    };
    let rest = chars.as_str();
    if !rest.starts_with(char::is_whitespace) {
        return Err(unrecognized(head));
    }
    let text = rest.trim();

    let children = parse_group(body)?;
    let node = match tree(Some(text.to_string()), children) {
        Some(node) => node,
        None => parse_leaf(head.number, text)?,
    };
    Ok((operator, node))
}

fn unrecognized(line: &Line<'_>) -> OutlineError {
    OutlineError::UnrecognizedOperator {
        line: line.number,
        text: line.text.to_string(),
    }
}

/// `None` when there are no children; the first child's operator wins.
fn tree(name: Option<String>, children: Vec<(Operator, OutlineNode)>) -> Option<OutlineNode> {
    let operator = children.first()?.0;
    Some(OutlineNode::Tree {
        name,
        operator,
        children: children.into_iter().map(|(_, node)| node).collect(),
    })
}

fn parse_leaf(line: usize, text: &str) -> Result<OutlineNode, OutlineError> {
    let (name, estimate) = text.split_once(':').ok_or_else(|| OutlineError::MissingEstimate {
        line,
        name: text.to_string(),
    })?;
    let invalid = || OutlineError::InvalidEstimate {
        line,
        estimate: estimate.trim().to_string(),
    };
    let (low, high) = estimate.split_once('-').ok_or_else(invalid)?;
    let low: f64 = low.trim().parse().map_err(|_| invalid())?;
    let high: f64 = high.trim().parse().map_err(|_| invalid())?;
    Ok(OutlineNode::Leaf {
        name: name.trim().to_string(),
        low,
        high,
    })
}
