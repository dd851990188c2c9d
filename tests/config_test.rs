//! Integration tests for layered settings and CLI overrides.
//!
//! Precedence: defaults < global config < --config file < RRAT_* env < CLI flags.
//!
//! Note: these tests only use explicit config files in temp directories and
//! leave the process environment alone.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rrat::cli::{load_settings, propagate_inputs, CliError, InputArgs};
use rrat::config::Settings;
use rrat::domain::{AggregationPolicy, ConflictPolicy, Lookup};
use rrat::exitcode;
use rrat::infrastructure::TableFormat;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("rrat.toml");
    fs::write(&path, content).unwrap();
    path
}

fn fixture(name: &str) -> PathBuf {
    Path::new("tests/resources/taxonomy").join(name)
}

// ============================================================
// Settings::load()
// ============================================================

#[test]
fn given_config_file_when_load_then_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
root_id = "131567"
aggregation = "median-low"
conflict = "abort"

[input]
format = "dmp"
delimiter = ";"
"#,
    );

    let settings = Settings::load(Some(&path)).expect("load settings");

    assert_eq!(settings.root_id, "131567");
    assert_eq!(settings.aggregation, AggregationPolicy::MedianLow);
    assert_eq!(settings.conflict, ConflictPolicy::Abort);
    assert_eq!(settings.input.format, TableFormat::Dmp);
    assert_eq!(settings.copy_number_table().unwrap().delimiter, ';');
    // untouched keys keep their defaults
    assert_eq!(settings.input.value_column, "16S gene count");
}

#[test]
fn given_missing_config_file_when_load_then_error() {
    let result = Settings::load(Some(Path::new("/nonexistent/rrat.toml")));
    assert!(result.is_err());
}

#[test]
fn given_unknown_policy_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "aggregation = \"mean\"\n");

    let err = CliError::from(Settings::load(Some(&path)).unwrap_err());
    assert_eq!(err.exit_code(), exitcode::CONFIG);
}

#[test]
fn given_empty_root_id_when_load_then_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "root_id = \"  \"\n");

    assert!(Settings::load(Some(&path)).is_err());
}

#[test]
fn given_input_paths_in_config_when_load_then_kept() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[input]
nodes = "/data/nodes.dmp"
rrndb = "/data/rrndb.tsv"
"#,
    );

    let settings = Settings::load(Some(&path)).unwrap();

    assert_eq!(settings.input.nodes, Some(PathBuf::from("/data/nodes.dmp")));
    assert_eq!(settings.input.rrndb, Some(PathBuf::from("/data/rrndb.tsv")));
    assert!(settings.input.merged.is_none());
}

#[test]
fn given_template_when_parsed_then_equals_defaults() {
    let parsed: Settings = toml::from_str(&Settings::template()).unwrap();
    assert_eq!(parsed, Settings::default());
}

// ============================================================
// CLI overrides
// ============================================================

#[test]
fn given_cli_flags_when_load_settings_then_flags_win() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
aggregation = "median-low"

[input]
format = "csv"
nodes = "/data/nodes.csv"
"#,
    );
    let input = InputArgs {
        nodes: Some(PathBuf::from("/other/nodes.dmp")),
        format: Some(TableFormat::Dmp),
        aggregation: Some(AggregationPolicy::MedianHigh),
        root: Some("2".to_string()),
        ..Default::default()
    };

    let settings = load_settings(Some(&path), &input).unwrap();

    assert_eq!(settings.root_id, "2");
    assert_eq!(settings.aggregation, AggregationPolicy::MedianHigh);
    assert_eq!(settings.input.format, TableFormat::Dmp);
    assert_eq!(settings.input.nodes, Some(PathBuf::from("/other/nodes.dmp")));
}

#[test]
fn given_no_nodes_table_when_propagating_then_usage_error() {
    let settings = Settings::default();

    let err = propagate_inputs(&settings).unwrap_err();

    assert!(matches!(err, CliError::InvalidArgs(_)));
    assert_eq!(err.exit_code(), exitcode::USAGE);
}

#[test]
fn given_missing_input_file_when_propagating_then_noinput() {
    let mut settings = Settings::default();
    settings.input.nodes = Some(PathBuf::from("/nonexistent/nodes.csv"));
    settings.input.rrndb = Some(fixture("rrndb.tsv"));

    let err = propagate_inputs(&settings).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::NOINPUT);
}

#[test]
fn given_config_with_fixture_paths_when_propagating_then_resolves() {
    let dir = TempDir::new().unwrap();
    let cwd = std::env::current_dir().unwrap();
    let config = format!(
        r#"
aggregation = "median-high"

[input]
format = "dmp"
nodes = "{}"
merged = "{}"
rrndb = "{}"
"#,
        cwd.join(fixture("nodes.dmp")).display(),
        cwd.join(fixture("merged.dmp")).display(),
        cwd.join(fixture("rrndb.tsv")).display(),
    );
    let path = write_config(&dir, &config);

    let settings = load_settings(Some(&path), &InputArgs::default()).unwrap();
    let propagation = propagate_inputs(&settings).unwrap();

    // 7, 7, 8 after folding the merged id
    assert_eq!(propagation.lookup("562"), Lookup::Resolved(7.0));
    // median-high of 5.5 and 10
    assert_eq!(propagation.lookup("1385"), Lookup::Resolved(10.0));
    assert!(propagation.report.is_clean());
}
