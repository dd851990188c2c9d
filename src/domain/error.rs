//! Domain-level errors (no external dependencies)

use std::fmt;

use thiserror::Error;

/// Structural problems found while building the hierarchy.
///
/// These are collected per offending node and never abort a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralIssue {
    /// The configured root identifier never appeared in the edge list.
    MissingRoot(String),
    /// A subject was seen again with a different parent; the first edge wins.
    DuplicateEdge {
        tax_id: String,
        kept_parent: String,
        ignored_parent: String,
    },
    /// A non-root node names itself as parent.
    SelfParent(String),
    /// Attaching `tax_id` under `parent` would close a loop.
    Cycle { tax_id: String, parent: String },
    /// A component whose head has no parent and is not the root.
    Detached { head: String, size: usize },
}

impl fmt::Display for StructuralIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralIssue::MissingRoot(root) => write!(f, "root node {root} not present"),
            StructuralIssue::DuplicateEdge {
                tax_id,
                kept_parent,
                ignored_parent,
            } => write!(
                f,
                "node {tax_id} already attached to {kept_parent}, ignoring parent {ignored_parent}"
            ),
            StructuralIssue::SelfParent(tax_id) => write!(f, "node {tax_id} is its own parent"),
            StructuralIssue::Cycle { tax_id, parent } => {
                write!(f, "cycle detected attaching {tax_id} to {parent}")
            }
            StructuralIssue::Detached { head, size } => {
                write!(f, "{size} node(s) under {head} cannot reach the root")
            }
        }
    }
}

/// Domain errors represent violations of the propagation invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("node {tax_id} already contains a median copy number {existing} (attempted {attempted})")]
    Conflict {
        tax_id: String,
        existing: f64,
        attempted: f64,
    },

    #[error("structural error: {0}")]
    Structural(StructuralIssue),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("node has no resolved value: {0}")]
    Unresolved(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
