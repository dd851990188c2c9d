//! Tree builder turning (tax_id, parent_id) edges into a rooted taxonomy.

use std::collections::{HashMap, HashSet};

use generational_arena::Index;
use tracing::{debug, info, instrument, warn};

use crate::domain::aggregate::AggregateMap;
use crate::domain::arena::TaxonomyTree;
use crate::domain::entities::Edge;
use crate::domain::error::StructuralIssue;

/// Constructs a [`TaxonomyTree`] from an edge list in a single pass.
///
/// Nodes take their initial value from the aggregate map. A parent that is
/// referenced before its own edge shows up is created as a placeholder and
/// reused later. Problems are recorded on the tree, never fatal.
pub struct TreeBuilder<'a> {
    root_id: String,
    aggregates: &'a AggregateMap,
    tree: TaxonomyTree,
    /// Union-find links towards each component's head; absent means self
    heads: HashMap<Index, Index>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(root_id: impl Into<String>, aggregates: &'a AggregateMap) -> Self {
        Self {
            root_id: root_id.into(),
            aggregates,
            tree: TaxonomyTree::new(),
            heads: HashMap::new(),
        }
    }

    /// Consume all edges and return the finished tree.
    #[instrument(level = "debug", skip_all, fields(root = %self.root_id))]
    pub fn build<I>(mut self, edges: I) -> TaxonomyTree
    where
        I: IntoIterator<Item = Edge>,
    {
        let mut count = 0usize;
        for edge in edges {
            self.add_edge(&edge);
            count += 1;
        }
        info!(edges = count, nodes = self.tree.len(), "built node tree");
        self.finish()
    }

    fn node(&mut self, tax_id: &str) -> Index {
        let value = self.aggregates.get(tax_id).copied();
        self.tree.get_or_insert(tax_id, value)
    }

    /// Process one edge.
    pub fn add_edge(&mut self, edge: &Edge) {
        let child = self.node(&edge.tax_id);

        // root never gets a parent, whatever the edge says
        if edge.tax_id == self.root_id {
            return;
        }
        if edge.tax_id == edge.parent_id {
            warn!(tax_id = %edge.tax_id, "node is its own parent");
            self.tree
                .push_issue(StructuralIssue::SelfParent(edge.tax_id.clone()));
            return;
        }

        if let Some(existing) = self.parent_id_of(child) {
            if existing != edge.parent_id {
                warn!(tax_id = %edge.tax_id, kept = %existing, ignored = %edge.parent_id, "duplicate edge");
                self.tree.push_issue(StructuralIssue::DuplicateEdge {
                    tax_id: edge.tax_id.clone(),
                    kept_parent: existing,
                    ignored_parent: edge.parent_id.clone(),
                });
            }
            return;
        }

        // child has no parent yet, so it heads its own component
        let parent = self.node(&edge.parent_id);
        let head = self.head_of(parent);
        if head == child {
            warn!(tax_id = %edge.tax_id, parent = %edge.parent_id, "cycle detected");
            self.tree.push_issue(StructuralIssue::Cycle {
                tax_id: edge.tax_id.clone(),
                parent: edge.parent_id.clone(),
            });
            return;
        }
        self.tree.attach(child, parent);
        self.heads.insert(child, head);
    }

    fn parent_id_of(&self, idx: Index) -> Option<String> {
        let parent = self.tree.get_node(idx)?.parent?;
        self.tree.get_node(parent).map(|p| p.tax_id.clone())
    }

    /// Head of the component containing `idx`, with path compression.
    fn head_of(&mut self, idx: Index) -> Index {
        let mut head = idx;
        while let Some(&next) = self.heads.get(&head) {
            head = next;
        }
        let mut current = idx;
        while current != head {
            match self.heads.insert(current, head) {
                Some(next) => current = next,
                None => break,
            }
        }
        head
    }

    /// Resolve the root and record nodes that cannot reach it.
    fn finish(mut self) -> TaxonomyTree {
        let root = self.tree.index_of(&self.root_id);
        self.tree.set_root(root);

        let reachable: HashSet<Index> = self.tree.iter().map(|(idx, _)| idx).collect();
        if root.is_none() {
            warn!(root = %self.root_id, "root node not present");
            self.tree
                .push_issue(StructuralIssue::MissingRoot(self.root_id.clone()));
        }

        let mut detached: Vec<(String, usize)> = self
            .tree
            .nodes()
            .filter(|(idx, node)| node.parent.is_none() && !reachable.contains(idx))
            .map(|(idx, node)| (node.tax_id.clone(), self.tree.iter_from(idx).count()))
            .collect();
        detached.sort();
        for (head, size) in detached {
            debug!(head = %head, size, "detached component");
            self.tree
                .push_issue(StructuralIssue::Detached { head, size });
        }

        self.tree.set_reachable(reachable);
        self.tree
    }
}
