//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.

mod copy_number;

pub use copy_number::{CopyNumberService, Propagation, PropagationReport};
