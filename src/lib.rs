//! rrat: median 16S rRNA copy numbers for every node of a taxonomy.
//!
//! Observations are aggregated per tax id, placed on a tree built from
//! `(tax_id, parent_id)` edges, resolved bottom-up from descendants and
//! finally inherited top-down by nodes with nothing observed below them.
//!
//! Layers, inside out: [`domain`] (tree, aggregation, propagation),
//! [`application`] (the pipeline service), [`infrastructure`] (table
//! readers and writers), [`cli`].

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
