use std::collections::HashMap;

use generational_arena::Index;
use termtree::Tree;
use tracing::instrument;

use crate::domain::arena::TaxonomyTree;

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;

    /// Render the subtree under `start`, at most `max_depth` levels below it.
    fn subtree_string(&self, start: Index, max_depth: Option<usize>) -> Tree<String>;
}

impl TreeNodeConvert for TaxonomyTree {
    fn to_tree_string(&self) -> Tree<String> {
        match self.root() {
            Some(root) => self.subtree_string(root, None),
            None => Tree::new("Empty tree".to_string()),
        }
    }

    // Built bottom-up from a reversed pre-order so deep lineages don't recurse.
    #[instrument(level = "debug", skip(self))]
    fn subtree_string(&self, start: Index, max_depth: Option<usize>) -> Tree<String> {
        let mut order = Vec::new();
        let mut stack = vec![(start, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            let Some(node) = self.get_node(idx) else {
                continue;
            };
            order.push(idx);
            if max_depth.map_or(true, |max| depth < max) {
                for &child in node.children.iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }

        let mut built: HashMap<Index, Tree<String>> = HashMap::new();
        for idx in order.into_iter().rev() {
            let Some(node) = self.get_node(idx) else {
                continue;
            };
            let leaves: Vec<_> = node
                .children
                .iter()
                .filter_map(|child| built.remove(child))
                .collect();
            built.insert(idx, Tree::new(node.to_string()).with_leaves(leaves));
        }
        built
            .remove(&start)
            .unwrap_or_else(|| Tree::new("Empty tree".to_string()))
    }
}
