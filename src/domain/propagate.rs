//! Two-phase value propagation over a built taxonomy.
//!
//! Phase 1 walks the tree post-order and gives every empty node the
//! aggregate of its children's resolved values. Phase 2 walks pre-order and
//! hands a resolved node's value down to children that are still empty.
//! Both phases use explicit stacks; taxonomies get deep.

use generational_arena::Index;
use tracing::{debug, info, instrument, warn};

use crate::domain::arena::TaxonomyTree;
use crate::domain::entities::{AggregationPolicy, ConflictPolicy, PropagationOptions, RootStatus};
use crate::domain::error::{DomainError, DomainResult};

/// Outcome of a phase-2 run started at an arbitrary node.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritOutcome {
    /// Value of the start node handed down to its subtree
    pub start_value: f64,
    /// Number of nodes that inherited a value
    pub inherited: usize,
    pub conflicts: Vec<DomainError>,
}

/// Outcome of a propagation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationOutcome {
    pub root: RootStatus,
    /// Conflicts recorded under [`ConflictPolicy::SkipSubtree`]
    pub conflicts: Vec<DomainError>,
}

/// Phase 1 from `start`: resolve empty nodes from their descendants.
///
/// Nodes that already carry a value keep it, but their subtrees are still
/// visited so every node with a valued descendant gets resolved.
#[instrument(level = "debug", skip(tree))]
pub fn aggregate_upward(
    tree: &mut TaxonomyTree,
    start: Index,
    policy: AggregationPolicy,
) -> Option<f64> {
    let order: Vec<Index> = tree
        .iter_postorder_from(start)
        .map(|(idx, _)| idx)
        .collect();

    let mut resolved = 0usize;
    for idx in order {
        let Some(node) = tree.get_node(idx) else {
            continue;
        };
        if node.value.is_some() {
            continue;
        }
        let mut values: Vec<f64> = node
            .children
            .iter()
            .filter_map(|&child| tree.get_node(child).and_then(|c| c.value))
            .collect();
        if let Some(value) = policy.apply(&mut values) {
            if let Some(node) = tree.get_node_mut(idx) {
                node.value = Some(value);
                resolved += 1;
            }
        }
    }
    debug!(resolved, "upward aggregation done");
    tree.get_node(start).and_then(|n| n.value)
}

/// Phase 2 from `start`: fill still-empty descendants with the nearest
/// resolved ancestor's value.
///
/// Children that already hold a value are never reassigned and are not
/// reported; the traversal continues below them with their own value.
/// `policy` is only consulted when the guarded assignment to an empty child
/// is refused, which the arena never does for a tree in a consistent state.
///
/// Returns the number of nodes that inherited a value.
#[instrument(level = "debug", skip(tree, conflicts))]
pub fn inherit_downward(
    tree: &mut TaxonomyTree,
    start: Index,
    policy: ConflictPolicy,
    conflicts: &mut Vec<DomainError>,
) -> DomainResult<usize> {
    let mut inherited = 0usize;
    let mut stack = vec![start];

    while let Some(idx) = stack.pop() {
        let Some(node) = tree.get_node(idx) else {
            continue;
        };
        let value = node.value;
        let children = node.children.clone();

        for child in children.into_iter().rev() {
            let child_empty = tree.get_node(child).is_some_and(|c| c.value.is_none());
            if let (true, Some(value)) = (child_empty, value) {
                if let Err(e) = tree.set_value(child, value) {
                    match policy {
                        ConflictPolicy::Abort => return Err(e),
                        ConflictPolicy::SkipSubtree => {
                            warn!(error = %e, "skipping subtree");
                            conflicts.push(e);
                            continue;
                        }
                    }
                }
                inherited += 1;
            }
            stack.push(child);
        }
    }
    debug!(inherited, "downward inheritance done");
    Ok(inherited)
}

/// Run both phases from the tree's root.
///
/// A missing or unresolved root is reported through [`RootStatus`]; in that
/// case nothing is inherited and only directly observed or
/// descendant-derived values are set.
#[instrument(level = "debug", skip(tree))]
pub fn propagate(
    tree: &mut TaxonomyTree,
    options: &PropagationOptions,
) -> DomainResult<PropagationOutcome> {
    let mut conflicts = Vec::new();
    let Some(root) = tree.root() else {
        warn!(root = %options.root_id, "no root, nothing to propagate");
        return Ok(PropagationOutcome {
            root: RootStatus::Missing,
            conflicts,
        });
    };

    info!("executing postorder traversal");
    let Some(root_value) = aggregate_upward(tree, root, options.aggregation) else {
        warn!(root = %options.root_id, "root has no resolved value");
        return Ok(PropagationOutcome {
            root: RootStatus::Unresolved,
            conflicts,
        });
    };

    info!(root_value, "executing preorder traversal");
    inherit_downward(tree, root, options.conflict, &mut conflicts)?;

    Ok(PropagationOutcome {
        root: RootStatus::Resolved(root_value),
        conflicts,
    })
}

/// Phase 1 only, from an arbitrary node.
pub fn aggregate_subtree(
    tree: &mut TaxonomyTree,
    tax_id: &str,
    policy: AggregationPolicy,
) -> DomainResult<Option<f64>> {
    let idx = tree
        .index_of(tax_id)
        .ok_or_else(|| DomainError::NodeNotFound(tax_id.to_string()))?;
    Ok(aggregate_upward(tree, idx, policy))
}

/// Phase 2 only, from an arbitrary node which must already be resolved.
pub fn inherit_from(
    tree: &mut TaxonomyTree,
    tax_id: &str,
    policy: ConflictPolicy,
) -> DomainResult<InheritOutcome> {
    let idx = tree
        .index_of(tax_id)
        .ok_or_else(|| DomainError::NodeNotFound(tax_id.to_string()))?;
    let start_value = tree
        .get_node(idx)
        .and_then(|n| n.value)
        .ok_or_else(|| DomainError::Unresolved(tax_id.to_string()))?;

    let mut conflicts = Vec::new();
    let inherited = inherit_downward(tree, idx, policy, &mut conflicts)?;
    Ok(InheritOutcome {
        start_value,
        inherited,
        conflicts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::AggregateMap;
    use crate::domain::builder::TreeBuilder;
    use crate::domain::entities::{Edge, Lookup};

    fn build(pairs: &[(&str, &str)], values: &[(&str, f64)]) -> TaxonomyTree {
        let aggregates: AggregateMap = values.iter().map(|&(k, v)| (k.to_string(), v)).collect();
        TreeBuilder::new("1", &aggregates).build(pairs.iter().map(|&(c, p)| Edge::new(c, p)))
    }

    #[test]
    fn given_reference_example_when_propagating_then_matches() {
        let mut tree = build(
            &[("1", "1"), ("2", "1"), ("3", "1"), ("4", "2"), ("5", "2")],
            &[("4", 10.0), ("5", 20.0)],
        );
        let outcome = propagate(&mut tree, &PropagationOptions::default()).unwrap();

        assert_eq!(outcome.root, RootStatus::Resolved(15.0));
        assert!(outcome.conflicts.is_empty());
        assert_eq!(tree.lookup("4"), Lookup::Resolved(10.0));
        assert_eq!(tree.lookup("5"), Lookup::Resolved(20.0));
        assert_eq!(tree.lookup("2"), Lookup::Resolved(15.0));
        assert_eq!(tree.lookup("1"), Lookup::Resolved(15.0));
        assert_eq!(tree.lookup("3"), Lookup::Resolved(15.0));
    }

    #[test]
    fn given_valued_node_with_valued_descendant_when_propagating_then_descendant_data_wins() {
        // 1 -> 2(3.0) -> 6 -> 7(9.0), 2 -> 8
        let mut tree = build(
            &[("1", "1"), ("2", "1"), ("6", "2"), ("7", "6"), ("8", "2")],
            &[("2", 3.0), ("7", 9.0)],
        );
        propagate(&mut tree, &PropagationOptions::default()).unwrap();

        assert_eq!(tree.lookup("2"), Lookup::Resolved(3.0));
        assert_eq!(tree.lookup("6"), Lookup::Resolved(9.0));
        assert_eq!(tree.lookup("8"), Lookup::Resolved(3.0));
    }

    #[test]
    fn given_no_observations_when_propagating_then_root_unresolved() {
        let mut tree = build(&[("1", "1"), ("2", "1")], &[]);
        let outcome = propagate(&mut tree, &PropagationOptions::default()).unwrap();
        assert_eq!(outcome.root, RootStatus::Unresolved);
        assert_eq!(tree.lookup("2"), Lookup::Unresolved);
    }

    #[test]
    fn given_detached_component_when_propagating_then_left_alone() {
        let mut tree = build(
            &[("1", "1"), ("2", "1"), ("20", "21"), ("22", "20")],
            &[("2", 4.0), ("20", 8.0)],
        );
        propagate(&mut tree, &PropagationOptions::default()).unwrap();
        assert_eq!(tree.lookup("1"), Lookup::Resolved(4.0));
        assert_eq!(tree.lookup("20"), Lookup::Resolved(8.0));
        assert_eq!(tree.lookup("21"), Lookup::Unresolved);
        assert_eq!(tree.lookup("22"), Lookup::Unresolved);
    }

    #[test]
    fn given_interior_node_when_aggregating_subtree_then_only_phase_one() {
        let mut tree = build(
            &[("1", "1"), ("2", "1"), ("3", "1"), ("4", "2"), ("5", "2")],
            &[("4", 1.0), ("5", 3.0)],
        );
        let value = aggregate_subtree(&mut tree, "2", AggregationPolicy::Median).unwrap();
        assert_eq!(value, Some(2.0));
        assert_eq!(tree.lookup("1"), Lookup::Unresolved);
        assert_eq!(tree.lookup("3"), Lookup::Unresolved);

        assert_eq!(
            aggregate_subtree(&mut tree, "42", AggregationPolicy::Median),
            Err(DomainError::NodeNotFound("42".into()))
        );
    }

    #[test]
    fn given_unresolved_start_when_inheriting_then_errors() {
        let mut tree = build(&[("1", "1"), ("2", "1")], &[]);
        assert_eq!(
            inherit_from(&mut tree, "1", ConflictPolicy::Abort),
            Err(DomainError::Unresolved("1".into()))
        );
    }

    #[test]
    fn given_resolved_interior_node_when_inheriting_then_fills_subtree_only() {
        let mut tree = build(&[("1", "1"), ("2", "1"), ("3", "1"), ("4", "2")], &[("2", 6.0)]);
        let outcome = inherit_from(&mut tree, "2", ConflictPolicy::SkipSubtree).unwrap();
        assert_eq!(outcome.start_value, 6.0);
        assert_eq!(outcome.inherited, 1);
        assert_eq!(tree.lookup("4"), Lookup::Resolved(6.0));
        assert_eq!(tree.lookup("3"), Lookup::Unresolved);
    }

    #[rstest::rstest]
    #[case(ConflictPolicy::SkipSubtree)]
    #[case(ConflictPolicy::Abort)]
    fn given_valued_children_when_inheriting_then_kept_without_conflict(
        #[case] policy: ConflictPolicy,
    ) {
        // 1(4.0) -> 2(9.0) -> 5, 1 -> 3 -> 6(1.0), 1 -> 4
        let mut tree = build(
            &[("1", "1"), ("2", "1"), ("3", "1"), ("4", "1"), ("5", "2"), ("6", "3")],
            &[("1", 4.0), ("2", 9.0), ("6", 1.0)],
        );
        let root = tree.root().unwrap();
        let mut conflicts = Vec::new();

        let inherited = inherit_downward(&mut tree, root, policy, &mut conflicts).unwrap();

        assert!(conflicts.is_empty());
        assert_eq!(inherited, 3);
        assert_eq!(tree.lookup("2"), Lookup::Resolved(9.0));
        assert_eq!(tree.lookup("5"), Lookup::Resolved(9.0));
        assert_eq!(tree.lookup("3"), Lookup::Resolved(4.0));
        assert_eq!(tree.lookup("6"), Lookup::Resolved(1.0));
        assert_eq!(tree.lookup("4"), Lookup::Resolved(4.0));
    }
}
