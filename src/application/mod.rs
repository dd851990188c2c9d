//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic. Sources are handed in already
//! materialized; file access lives in the infrastructure layer.

pub mod error;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
