//! Property tests for propagation over random rooted trees.
//!
//! Node `i` (1-based, root is 1) always has a parent with a smaller id, so
//! descending id order is a valid bottom-up order for the reference model.

use proptest::prelude::*;

use rrat::application::services::CopyNumberService;
use rrat::domain::{
    AggregationPolicy, DomainError, Edge, Lookup, PropagationOptions, RawObservation, RemapTable,
};

#[derive(Debug, Clone)]
struct Case {
    /// parents[i] is the parent of node i + 2
    parents: Vec<usize>,
    /// (node, value) pairs, several per node allowed
    observations: Vec<(usize, f64)>,
}

impl Case {
    fn len(&self) -> usize {
        self.parents.len() + 1
    }

    fn parent(&self, node: usize) -> Option<usize> {
        (node >= 2).then(|| self.parents[node - 2])
    }

    fn edges(&self) -> Vec<Edge> {
        let mut edges = vec![Edge::new("1", "1")];
        edges.extend(
            self.parents
                .iter()
                .enumerate()
                .map(|(i, p)| Edge::new((i + 2).to_string(), p.to_string())),
        );
        edges
    }

    fn raw_observations(&self) -> Vec<RawObservation> {
        self.observations
            .iter()
            .map(|&(node, v)| RawObservation::number(node.to_string(), v))
            .collect()
    }

    /// Values every node should end up with.
    fn expected(&self, policy: AggregationPolicy) -> Vec<Option<f64>> {
        let n = self.len();
        let mut observed: Vec<Vec<f64>> = vec![Vec::new(); n + 1];
        for &(node, v) in &self.observations {
            observed[node].push(v);
        }
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n + 1];
        for node in 2..=n {
            if let Some(p) = self.parent(node) {
                children[p].push(node);
            }
        }

        let mut upward: Vec<Option<f64>> = vec![None; n + 1];
        for node in (1..=n).rev() {
            upward[node] = if observed[node].is_empty() {
                let mut values: Vec<f64> = children[node].iter().filter_map(|&c| upward[c]).collect();
                policy.apply(&mut values)
            } else {
                policy.apply(&mut observed[node])
            };
        }

        if upward[1].is_none() {
            return upward;
        }
        let mut result = upward.clone();
        for node in 2..=n {
            if result[node].is_none() {
                result[node] = self.parent(node).and_then(|p| result[p]);
            }
        }
        result
    }
}

fn case_strategy() -> impl Strategy<Value = Case> {
    (1..60usize)
        .prop_flat_map(|extra| {
            let parents = (0..extra)
                .map(|i| 1..=(i + 1))
                .collect::<Vec<_>>();
            let node_count = extra + 1;
            (
                parents,
                proptest::collection::vec((1..=node_count, 0u8..20), 0..30),
            )
        })
        .prop_map(|(parents, obs)| Case {
            parents,
            observations: obs.into_iter().map(|(n, v)| (n, f64::from(v))).collect(),
        })
}

fn policy_strategy() -> impl Strategy<Value = AggregationPolicy> {
    prop_oneof![
        Just(AggregationPolicy::Median),
        Just(AggregationPolicy::MedianLow),
        Just(AggregationPolicy::MedianHigh),
    ]
}

proptest! {
    #[test]
    fn prop_propagation_matches_reference_model(
        case in case_strategy(),
        policy in policy_strategy(),
    ) {
        let options = PropagationOptions { aggregation: policy, ..Default::default() };
        let propagation = CopyNumberService::new(options)
            .run(case.edges(), &RemapTable::new(), case.raw_observations())
            .unwrap();

        let expected = case.expected(policy);
        for node in 1..=case.len() {
            let actual = propagation.lookup(&node.to_string());
            match expected[node] {
                Some(v) => prop_assert_eq!(actual, Lookup::Resolved(v), "node {}", node),
                None => prop_assert_eq!(actual, Lookup::Unresolved, "node {}", node),
            }
        }
        prop_assert!(propagation.report.conflicts.is_empty());
    }

    #[test]
    fn prop_every_node_resolved_iff_root_resolved(case in case_strategy()) {
        let propagation = CopyNumberService::default()
            .run(case.edges(), &RemapTable::new(), case.raw_observations())
            .unwrap();

        let root_resolved = propagation.lookup("1").value().is_some();
        prop_assert_eq!(root_resolved, !case.observations.is_empty());
        if root_resolved {
            prop_assert_eq!(propagation.report.unresolved, 0);
            prop_assert_eq!(propagation.report.resolved, case.len());
        }
    }

    #[test]
    fn prop_observed_values_never_overwritten(case in case_strategy()) {
        let propagation = CopyNumberService::default()
            .run(case.edges(), &RemapTable::new(), case.raw_observations())
            .unwrap();

        for &(node, _) in &case.observations {
            let mut values: Vec<f64> = case
                .observations
                .iter()
                .filter(|&&(n, _)| n == node)
                .map(|&(_, v)| v)
                .collect();
            let expected = AggregationPolicy::Median.apply(&mut values);
            prop_assert_eq!(propagation.lookup(&node.to_string()).value(), expected);
        }
    }

    #[test]
    fn prop_running_twice_is_identical(case in case_strategy()) {
        let service = CopyNumberService::default();
        let first = service
            .run(case.edges(), &RemapTable::new(), case.raw_observations())
            .unwrap();
        let mut second = service
            .run(case.edges(), &RemapTable::new(), case.raw_observations())
            .unwrap();

        for node in 1..=case.len() {
            let id = node.to_string();
            prop_assert_eq!(first.lookup(&id), second.lookup(&id));
            // re-assigning an identical value is a no-op, a different one is refused
            if let Lookup::Resolved(v) = second.lookup(&id) {
                prop_assert!(second.tree.set_value_by_id(&id, v).is_ok());
                let err = second.tree.set_value_by_id(&id, v + 1.0).unwrap_err();
                let is_conflict = matches!(err, DomainError::Conflict { .. });
                prop_assert!(is_conflict);
            }
        }
    }
}
