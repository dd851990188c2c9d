use std::collections::{HashMap, HashSet};
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::Lookup;
use crate::domain::error::{DomainError, DomainResult, StructuralIssue};

/// Tree node in the arena-based taxonomy.
#[derive(Debug, Clone)]
pub struct TaxNode {
    pub tax_id: String,
    /// Median copy number, None until resolved
    pub value: Option<f64>,
    /// Index of parent node in the arena, None for the root and detached heads
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena
    pub children: Vec<Index>,
}

impl TaxNode {
    fn new(tax_id: String, value: Option<f64>) -> Self {
        Self {
            tax_id,
            value,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Set the value if empty. Re-setting the same value is a no-op,
    /// a different value is a conflict and leaves the node untouched.
    pub fn set_value(&mut self, value: f64) -> DomainResult<()> {
        match self.value {
            None => {
                self.value = Some(value);
                Ok(())
            }
            Some(existing) if existing == value => Ok(()),
            Some(existing) => Err(DomainError::Conflict {
                tax_id: self.tax_id.clone(),
                existing,
                attempted: value,
            }),
        }
    }
}

impl fmt::Display for TaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{} --> {}", self.tax_id, v),
            None => write!(f, "{} --> unresolved", self.tax_id),
        }
    }
}

/// Arena-backed taxonomy with an identifier registry.
///
/// Parent links are arena indices, so there are no reference cycles; every
/// tax id maps to exactly one node. Structure is fixed once the builder
/// hands the tree out, only values change afterwards.
#[derive(Debug, Default)]
pub struct TaxonomyTree {
    arena: Arena<TaxNode>,
    registry: HashMap<String, Index>,
    root: Option<Index>,
    reachable: HashSet<Index>,
    issues: Vec<StructuralIssue>,
}

impl TaxonomyTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node for `tax_id`, creating it with `value` if unknown.
    #[instrument(level = "trace", skip(self))]
    pub fn get_or_insert(&mut self, tax_id: &str, value: Option<f64>) -> Index {
        if let Some(&idx) = self.registry.get(tax_id) {
            return idx;
        }
        let idx = self.arena.insert(TaxNode::new(tax_id.to_string(), value));
        self.registry.insert(tax_id.to_string(), idx);
        idx
    }

    /// Link `child` under `parent`. Caller guarantees `child` has no parent yet.
    pub(crate) fn attach(&mut self, child: Index, parent: Index) {
        if let Some(node) = self.arena.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.arena.get_mut(parent) {
            node.children.push(child);
        }
    }

    pub(crate) fn set_root(&mut self, root: Option<Index>) {
        self.root = root;
    }

    pub(crate) fn set_reachable(&mut self, reachable: HashSet<Index>) {
        self.reachable = reachable;
    }

    pub(crate) fn push_issue(&mut self, issue: StructuralIssue) {
        self.issues.push(issue);
    }

    pub fn get_node(&self, idx: Index) -> Option<&TaxNode> {
        self.arena.get(idx)
    }

    pub fn get_node_mut(&mut self, idx: Index) -> Option<&mut TaxNode> {
        self.arena.get_mut(idx)
    }

    pub fn index_of(&self, tax_id: &str) -> Option<Index> {
        self.registry.get(tax_id).copied()
    }

    pub fn node(&self, tax_id: &str) -> Option<&TaxNode> {
        self.index_of(tax_id).and_then(|idx| self.arena.get(idx))
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Structural issues recorded while building.
    pub fn issues(&self) -> &[StructuralIssue] {
        &self.issues
    }

    /// Whether the node can be reached from the root via child links.
    pub fn is_reachable(&self, idx: Index) -> bool {
        self.reachable.contains(&idx)
    }

    pub fn is_detached(&self, tax_id: &str) -> bool {
        self.index_of(tax_id)
            .map(|idx| !self.is_reachable(idx))
            .unwrap_or(false)
    }

    /// Resolved value for `tax_id`; unknown ids are `NotFound`, not an error.
    pub fn lookup(&self, tax_id: &str) -> Lookup {
        match self.node(tax_id) {
            None => Lookup::NotFound,
            Some(node) => node.value.map_or(Lookup::Unresolved, Lookup::Resolved),
        }
    }

    /// Guarded assignment, see [`TaxNode::set_value`].
    pub fn set_value(&mut self, idx: Index, value: f64) -> DomainResult<()> {
        let node = self
            .arena
            .get_mut(idx)
            .ok_or_else(|| DomainError::NodeNotFound(format!("{idx:?}")))?;
        node.set_value(value)
    }

    /// Guarded assignment by tax id.
    pub fn set_value_by_id(&mut self, tax_id: &str, value: f64) -> DomainResult<()> {
        let idx = self
            .index_of(tax_id)
            .ok_or_else(|| DomainError::NodeNotFound(tax_id.to_string()))?;
        self.set_value(idx, value)
    }

    /// All nodes in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = (Index, &TaxNode)> {
        self.arena.iter()
    }

    pub fn resolved_count(&self) -> usize {
        self.arena.iter().filter(|(_, n)| n.value.is_some()).count()
    }

    /// Pre-order traversal from the root.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self, self.root)
    }

    /// Pre-order traversal from `start`.
    pub fn iter_from(&self, start: Index) -> TreeIterator<'_> {
        TreeIterator::new(self, Some(start))
    }

    /// Post-order traversal from `start`.
    pub fn iter_postorder_from(&self, start: Index) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self, Some(start))
    }

    /// Number of levels below and including the root.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut max = 0;
        let mut stack = vec![(root, 1usize)];
        while let Some((idx, level)) = stack.pop() {
            max = max.max(level);
            if let Some(node) = self.get_node(idx) {
                for &child in &node.children {
                    stack.push((child, level + 1));
                }
            }
        }
        max
    }
}

pub struct TreeIterator<'a> {
    tree: &'a TaxonomyTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a TaxonomyTree, start: Option<Index>) -> Self {
        Self {
            tree,
            stack: start.into_iter().collect(),
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TaxNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a TaxonomyTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a TaxonomyTree, start: Option<Index>) -> Self {
        Self {
            tree,
            stack: start.map(|idx| (idx, false)).into_iter().collect(),
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a TaxNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}
