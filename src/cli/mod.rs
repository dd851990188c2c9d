//! CLI layer: argument parsing and command dispatch

pub mod args;
pub mod commands;
pub mod error;
pub mod output;

pub use args::{Cli, Commands, ConfigCommands, InputArgs};
pub use commands::{execute_command, load_settings, propagate_inputs};
pub use error::{CliError, CliResult};
