//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::domain::{AggregationPolicy, ConflictPolicy};
use crate::infrastructure::TableFormat;

/// Calculates median 16S copy numbers for every node of the NCBI taxonomy.
///
/// Median copy numbers are aggregated from rrnDB observations bottom-up to
/// the root; nodes without observations below them inherit their nearest
/// resolved ancestor's value.
#[derive(Parser, Debug)]
#[command(name = "rrat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Append log output to a file instead of stderr
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub log: Option<PathBuf>,

    /// Additional config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Data sources and policies shared by the data commands.
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Copy number table with "NCBI tax id" and "16S gene count" columns
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub rrndb: Option<PathBuf>,

    /// Header-less nodes table with columns tax_id,parent_id,rank
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub nodes: Option<PathBuf>,

    /// Header-less merged table with columns old_tax_id,tax_id
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub merged: Option<PathBuf>,

    /// Format of the nodes and merged tables [csv, dmp]
    #[arg(long)]
    pub format: Option<TableFormat>,

    /// Tax id of the taxonomy root
    #[arg(long)]
    pub root: Option<String>,

    /// Aggregation statistic [median, median-low, median-high]
    #[arg(long)]
    pub aggregation: Option<AggregationPolicy>,

    /// Conflict policy [skip-subtree, abort]
    #[arg(long)]
    pub conflict: Option<ConflictPolicy>,

    /// Fail when the nodes table has structural problems
    #[arg(long)]
    pub strict: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Propagate copy numbers and write one row per tax id
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (default: stdout)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },

    /// Print the propagated value of tax ids
    Query {
        #[command(flatten)]
        input: InputArgs,

        /// Tax ids to look up
        #[arg(required = true, num_args = 1..)]
        tax_ids: Vec<String>,
    },

    /// Show the subtree under a tax id with values
    Tree {
        #[command(flatten)]
        input: InputArgs,

        /// Tax id to start from
        tax_id: String,

        /// Levels to show below the start node
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a config template
    Template,

    /// Show config paths
    Path,
}
