//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/rrat/rrat.toml`
//! 3. Explicit config file passed with `--config`
//! 4. Environment variables: `RRAT_*` prefix, `__` between sections
//!    (e.g. `RRAT_AGGREGATION=median-low`, `RRAT_INPUT__FORMAT=dmp`)
//!
//! CLI flags are applied on top by the command layer.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{AggregationPolicy, ConflictPolicy, PropagationOptions, DEFAULT_ROOT_ID};
use crate::infrastructure::{CopyNumberTable, TableFormat};

/// Where the input tables live and how they are laid out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputSettings {
    /// Format of the nodes and merged tables
    pub format: TableFormat,
    /// Field delimiter of the copy-number table (single character)
    pub delimiter: String,
    /// Header of the tax id column in the copy-number table
    pub tax_id_column: String,
    /// Header of the value column in the copy-number table
    pub value_column: String,
    /// Default nodes table
    pub nodes: Option<PathBuf>,
    /// Default merged table
    pub merged: Option<PathBuf>,
    /// Default copy-number table
    pub rrndb: Option<PathBuf>,
}

impl Default for InputSettings {
    fn default() -> Self {
        let table = CopyNumberTable::default();
        Self {
            format: TableFormat::default(),
            delimiter: table.delimiter.to_string(),
            tax_id_column: table.tax_id_column,
            value_column: table.value_column,
            nodes: None,
            merged: None,
            rrndb: None,
        }
    }
}

/// Unified configuration for rrat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Tax id of the taxonomy root (default: "1")
    pub root_id: String,
    /// Statistic used for observation groups and upward aggregation
    pub aggregation: AggregationPolicy,
    /// Behaviour when a value assignment conflicts
    pub conflict: ConflictPolicy,
    pub input: InputSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_id: DEFAULT_ROOT_ID.to_string(),
            aggregation: AggregationPolicy::default(),
            conflict: ConflictPolicy::default(),
            input: InputSettings::default(),
        }
    }
}

/// Get the XDG config directory for rrat.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rrat").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("rrat.toml"))
}

/// Expand `~`, `$VAR` and `${VAR}` in a path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `config_file` - Optional explicit config file; must exist if given
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&Settings::default()).map_err(config_err)?,
        );

        if let Some(global_path) = global_config_path() {
            builder = builder.add_source(File::from(global_path).required(false));
        }
        if let Some(path) = config_file {
            builder = builder.add_source(File::from(expand_path(path)).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("RRAT")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder.build().map_err(config_err)?;
        let mut settings: Self = config.try_deserialize().map_err(config_err)?;
        settings.expand_paths();
        settings.validate()?;
        Ok(settings)
    }

    /// Expand shell variables and tilde in the configured input paths.
    fn expand_paths(&mut self) {
        for path in [
            &mut self.input.nodes,
            &mut self.input.merged,
            &mut self.input.rrndb,
        ]
        .into_iter()
        .flatten()
        {
            *path = expand_path(path);
        }
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.root_id.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "root_id must not be empty".to_string(),
            });
        }
        self.copy_number_table().map(|_| ())
    }

    /// Policies for the propagation run.
    pub fn propagation_options(&self) -> PropagationOptions {
        PropagationOptions {
            root_id: self.root_id.clone(),
            aggregation: self.aggregation,
            conflict: self.conflict,
        }
    }

    /// Layout of the copy-number table.
    pub fn copy_number_table(&self) -> Result<CopyNumberTable, ApplicationError> {
        let delimiter = match self.input.delimiter.as_str() {
            "\\t" | "tab" => '\t',
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii() => c,
                    _ => {
                        return Err(ApplicationError::Config {
                            message: format!(
                                "input.delimiter must be a single ASCII character, got '{other}'"
                            ),
                        })
                    }
                }
            }
        };
        Ok(CopyNumberTable {
            delimiter,
            tax_id_column: self.input.tax_id_column.clone(),
            value_column: self.input.value_column.clone(),
        })
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# rrat configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/rrat/rrat.toml
#   File:   --config <FILE>
#   Env:    RRAT_* environment variables (RRAT_INPUT__FORMAT=dmp)

# Tax id of the taxonomy root
# root_id = "1"

# Statistic for observation groups and upward aggregation:
# median | median-low | median-high
# aggregation = "median"

# On conflicting assignments: skip-subtree | abort
# conflict = "skip-subtree"

[input]
# Format of the nodes/merged tables: csv | dmp
# format = "csv"

# Copy-number table layout
# delimiter = "\t"
# tax_id_column = "NCBI tax id"
# value_column = "16S gene count"

# Default input files
# nodes = "~/data/taxdump/nodes.dmp"
# merged = "~/data/taxdump/merged.dmp"
# rrndb = "~/data/rrnDB-5.4.tsv"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load(None).expect("load defaults");
        assert!(!settings.root_id.is_empty());
        assert!(settings.copy_number_table().is_ok());
    }

    #[test]
    fn given_default_settings_when_converted_then_matches_domain_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.propagation_options(), PropagationOptions::default());
        assert_eq!(
            settings.copy_number_table().unwrap(),
            CopyNumberTable::default()
        );
    }

    #[test]
    fn given_multi_char_delimiter_when_building_table_then_errors() {
        let mut settings = Settings::default();
        settings.input.delimiter = ";;".to_string();
        assert!(settings.copy_number_table().is_err());

        settings.input.delimiter = "§".to_string();
        assert!(settings.copy_number_table().is_err());

        settings.input.delimiter = "tab".to_string();
        assert_eq!(settings.copy_number_table().unwrap().delimiter, '\t');
    }

    #[test]
    fn given_tilde_in_input_path_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings::default();
        settings.input.nodes = Some(PathBuf::from("~/taxdump/nodes.dmp"));
        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let nodes = settings.input.nodes.unwrap();
        assert!(nodes.to_string_lossy().starts_with(&home));
    }

    #[test]
    fn given_settings_when_to_toml_then_round_trips() {
        let settings = Settings::default();
        let toml = settings.to_toml().unwrap();
        assert!(toml.contains("root_id = \"1\""));
        assert!(toml.contains("aggregation = \"median\""));
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, settings);
    }
}
