//! Domain entities: core data structures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Conventional NCBI root tax id.
pub const DEFAULT_ROOT_ID: &str = "1";

/// One (tax_id, parent_id) line of the hierarchy definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub tax_id: String,
    pub parent_id: String,
}

impl Edge {
    pub fn new(tax_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            tax_id: tax_id.into(),
            parent_id: parent_id.into(),
        }
    }
}

impl<A: Into<String>, B: Into<String>> From<(A, B)> for Edge {
    fn from((tax_id, parent_id): (A, B)) -> Self {
        Self::new(tax_id, parent_id)
    }
}

/// Value field of an observation as delivered by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationValue {
    Text(String),
    Number(f64),
}

impl ObservationValue {
    /// Numeric value, or None for empty, malformed or non-finite input.
    pub fn parse(&self) -> Option<f64> {
        let value = match self {
            ObservationValue::Text(s) => s.trim().parse::<f64>().ok()?,
            ObservationValue::Number(v) => *v,
        };
        value.is_finite().then_some(value)
    }
}

/// Observation before its value field has been validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub tax_id: String,
    pub value: ObservationValue,
}

impl RawObservation {
    pub fn text(tax_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tax_id: tax_id.into(),
            value: ObservationValue::Text(value.into()),
        }
    }

    pub fn number(tax_id: impl Into<String>, value: f64) -> Self {
        Self {
            tax_id: tax_id.into(),
            value: ObservationValue::Number(value),
        }
    }
}

/// A validated measurement for one tax id.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub tax_id: String,
    pub value: f64,
}

/// Central-tendency statistic used for both observation groups and phase-1 aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// Mean of the two middle values for even-sized groups.
    #[default]
    Median,
    /// Smaller of the two middle values.
    MedianLow,
    /// Larger of the two middle values.
    MedianHigh,
}

impl FromStr for AggregationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "median" => Ok(Self::Median),
            "median-low" | "median_low" => Ok(Self::MedianLow),
            "median-high" | "median_high" => Ok(Self::MedianHigh),
            other => Err(format!(
                "unknown aggregation '{other}' (expected median, median-low, median-high)"
            )),
        }
    }
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Median => "median",
            Self::MedianLow => "median-low",
            Self::MedianHigh => "median-high",
        };
        f.write_str(name)
    }
}

/// What the propagator does when a value assignment conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Record the conflict and stop descending into that subtree.
    #[default]
    SkipSubtree,
    /// Stop propagation and return the conflict as an error.
    Abort,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip-subtree" | "skip_subtree" => Ok(Self::SkipSubtree),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "unknown conflict policy '{other}' (expected skip-subtree, abort)"
            )),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipSubtree => f.write_str("skip-subtree"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

/// Explicit policies for one build + propagation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationOptions {
    pub root_id: String,
    pub aggregation: AggregationPolicy,
    pub conflict: ConflictPolicy,
}

impl Default for PropagationOptions {
    fn default() -> Self {
        Self {
            root_id: DEFAULT_ROOT_ID.to_string(),
            aggregation: AggregationPolicy::default(),
            conflict: ConflictPolicy::default(),
        }
    }
}

/// Result of querying a tax id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Resolved(f64),
    Unresolved,
    NotFound,
}

impl Lookup {
    pub fn value(&self) -> Option<f64> {
        match self {
            Lookup::Resolved(v) => Some(*v),
            _ => None,
        }
    }
}

/// State of the root after phase 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RootStatus {
    Resolved(f64),
    /// Root exists but no node reachable from it carries a value.
    Unresolved,
    /// Root identifier is not part of the tree.
    Missing,
}
