//! Observation aggregation: remap deprecated tax ids, drop unusable values,
//! reduce each tax id's measurements to a single median.

use std::collections::HashMap;

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::domain::entities::{AggregationPolicy, Observation, RawObservation};

/// tax id -> aggregated observation value.
pub type AggregateMap = HashMap<String, f64>;

/// deprecated tax id -> current tax id.
pub type RemapTable = HashMap<String, String>;

impl AggregationPolicy {
    /// Reduce `values` to one number; None for an empty slice.
    ///
    /// Sorts `values` in place.
    pub fn apply(&self, values: &mut [f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let mid = n / 2;
        if n % 2 == 1 {
            return Some(values[mid]);
        }
        let value = match self {
            AggregationPolicy::Median => (values[mid - 1] + values[mid]) / 2.0,
            AggregationPolicy::MedianLow => values[mid - 1],
            AggregationPolicy::MedianHigh => values[mid],
        };
        Some(value)
    }
}

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationSummary {
    pub aggregates: AggregateMap,
    /// Observations that made it into a group
    pub accepted: usize,
    /// Observations dropped for an empty or malformed value
    pub dropped: usize,
    /// Observations whose tax id was rewritten through the remap table
    pub remapped: usize,
}

/// Group observations by (remapped) tax id and aggregate each group.
#[instrument(level = "debug", skip_all, fields(remap_entries = remap.len()))]
pub fn aggregate_observations<I>(
    observations: I,
    remap: &RemapTable,
    policy: AggregationPolicy,
) -> AggregationSummary
where
    I: IntoIterator<Item = RawObservation>,
{
    let mut summary = AggregationSummary::default();

    let parsed: Vec<Observation> = observations
        .into_iter()
        .filter_map(|raw| match raw.value.parse() {
            Some(value) => Some(Observation {
                tax_id: raw.tax_id,
                value,
            }),
            None => {
                debug!(tax_id = %raw.tax_id, value = ?raw.value, "dropping observation");
                summary.dropped += 1;
                None
            }
        })
        .map(|obs| match remap.get(&obs.tax_id) {
            Some(current) => {
                summary.remapped += 1;
                Observation {
                    tax_id: current.clone(),
                    value: obs.value,
                }
            }
            None => obs,
        })
        .collect();
    summary.accepted = parsed.len();

    summary.aggregates = parsed
        .into_iter()
        .map(|obs| (obs.tax_id, obs.value))
        .into_group_map()
        .into_iter()
        .filter_map(|(tax_id, mut values)| policy.apply(&mut values).map(|v| (tax_id, v)))
        .collect();

    debug!(
        groups = summary.aggregates.len(),
        accepted = summary.accepted,
        dropped = summary.dropped,
        remapped = summary.remapped,
        "aggregated observations"
    );
    summary
}
