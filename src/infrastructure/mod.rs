//! Infrastructure layer: reading local data sources and writing results
//!
//! Turns node, merged and copy-number tables into the materialized sources
//! the application layer consumes.

pub mod error;
pub mod sources;

pub use error::{InfraError, InfraResult};
pub use sources::{
    read_edges, read_observations, read_remap, write_table, write_table_to_path, CopyNumberTable,
    TableFormat,
};
