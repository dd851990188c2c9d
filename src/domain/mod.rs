//! Domain layer: entities and propagation logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod aggregate;
pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod propagate;
pub mod render;

pub use aggregate::{aggregate_observations, AggregateMap, AggregationSummary, RemapTable};
pub use arena::{TaxNode, TaxonomyTree};
pub use builder::TreeBuilder;
pub use entities::*;
pub use error::{DomainError, DomainResult, StructuralIssue};
pub use propagate::{
    aggregate_subtree, inherit_from, propagate, InheritOutcome, PropagationOutcome,
};
pub use render::TreeNodeConvert;
