//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, info, instrument};

use crate::application::services::{CopyNumberService, Propagation, PropagationReport};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands, InputArgs};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{DomainError, Lookup, RemapTable, RootStatus, TreeNodeConvert};
use crate::infrastructure::{
    read_edges, read_observations, read_remap, write_table, write_table_to_path, InfraError,
};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Run { input, out }) => cmd_run(cli, input, out.as_deref()),
        Some(Commands::Query { input, tax_ids }) => cmd_query(cli, input, tax_ids),
        Some(Commands::Tree {
            input,
            tax_id,
            depth,
        }) => cmd_tree(cli, input, tax_id, *depth),
        Some(Commands::Config { command }) => cmd_config(cli, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see 'rrat --help'".to_string(),
        )),
    }
}

/// Layered settings with CLI flags applied last.
pub fn load_settings(config: Option<&Path>, input: &InputArgs) -> CliResult<Settings> {
    let mut settings = Settings::load(config)?;
    if let Some(root) = &input.root {
        settings.root_id = root.clone();
    }
    if let Some(aggregation) = input.aggregation {
        settings.aggregation = aggregation;
    }
    if let Some(conflict) = input.conflict {
        settings.conflict = conflict;
    }
    if let Some(format) = input.format {
        settings.input.format = format;
    }
    for (flag, target) in [
        (&input.nodes, &mut settings.input.nodes),
        (&input.merged, &mut settings.input.merged),
        (&input.rrndb, &mut settings.input.rrndb),
    ] {
        if let Some(path) = flag {
            *target = Some(path.clone());
        }
    }
    debug!(?settings, "effective settings");
    Ok(settings)
}

fn required<'a>(path: &'a Option<PathBuf>, flag: &str) -> CliResult<&'a Path> {
    path.as_deref().ok_or_else(|| {
        CliError::InvalidArgs(format!(
            "{flag} is required (set it on the command line or in the config)"
        ))
    })
}

/// Read all sources named by `settings` and run the pipeline.
#[instrument(level = "debug", skip(settings))]
pub fn propagate_inputs(settings: &Settings) -> CliResult<Propagation> {
    let nodes = required(&settings.input.nodes, "--nodes")?;
    let rrndb = required(&settings.input.rrndb, "--rrndb")?;
    let format = settings.input.format;

    info!(path = %nodes.display(), %format, "reading nodes");
    let edges = read_edges(nodes, format)?;

    let remap = match &settings.input.merged {
        Some(merged) => {
            info!(path = %merged.display(), %format, "reading merged tax ids");
            read_remap(merged, format)?
        }
        None => RemapTable::new(),
    };

    info!(path = %rrndb.display(), "reading copy numbers");
    let observations = read_observations(rrndb, &settings.copy_number_table()?)?;

    let service = CopyNumberService::new(settings.propagation_options());
    let propagation = service.run(edges, &remap, observations)?;
    report(&propagation.report, &settings.root_id);
    Ok(propagation)
}

/// With `--strict`, the first structural issue fails the command.
fn ensure_clean(input: &InputArgs, report: &PropagationReport) -> CliResult<()> {
    match report.structural.first() {
        Some(issue) if input.strict => Err(ApplicationError::from(DomainError::Structural(
            issue.clone(),
        ))
        .into()),
        _ => Ok(()),
    }
}

fn report(report: &PropagationReport, root_id: &str) {
    info!(
        observed_taxa = report.observed_taxa,
        accepted = report.accepted_observations,
        dropped = report.dropped_observations,
        remapped = report.remapped_observations,
        "observations aggregated"
    );
    for issue in &report.structural {
        output::warning(issue);
    }
    for conflict in &report.conflicts {
        output::warning(conflict);
    }
    match report.root {
        RootStatus::Resolved(value) => debug!(root_id, value, "root resolved"),
        RootStatus::Unresolved => output::warning(&format!(
            "root {root_id} has no resolved value; no values were inherited"
        )),
        RootStatus::Missing => output::warning(&format!(
            "root {root_id} is not in the nodes table; no values were propagated"
        )),
    }
}

#[instrument(level = "debug", skip(cli))]
fn cmd_run(cli: &Cli, input: &InputArgs, out: Option<&Path>) -> CliResult<()> {
    let settings = load_settings(cli.config.as_deref(), input)?;
    let propagation = propagate_inputs(&settings)?;
    ensure_clean(input, &propagation.report)?;

    match out {
        Some(path) => {
            write_table_to_path(&propagation.tree, path)?;
            output::action(
                "Wrote",
                &format!(
                    "{} ({} resolved, {} unresolved)",
                    path.display(),
                    propagation.report.resolved,
                    propagation.report.unresolved
                ),
            );
        }
        None => write_table(&propagation.tree, io::stdout().lock())
            .map_err(|e| InfraError::io("write stdout", e))?,
    }
    Ok(())
}

#[instrument(level = "debug", skip(cli))]
fn cmd_query(cli: &Cli, input: &InputArgs, tax_ids: &[String]) -> CliResult<()> {
    let settings = load_settings(cli.config.as_deref(), input)?;
    let propagation = propagate_inputs(&settings)?;
    ensure_clean(input, &propagation.report)?;

    for tax_id in tax_ids {
        match propagation.lookup(tax_id) {
            Lookup::Resolved(value) => output::resolved(tax_id, value),
            Lookup::Unresolved => output::unresolved(tax_id),
            Lookup::NotFound => output::warning(&format!("{tax_id}: not found")),
        }
    }
    Ok(())
}

#[instrument(level = "debug", skip(cli))]
fn cmd_tree(cli: &Cli, input: &InputArgs, tax_id: &str, depth: Option<usize>) -> CliResult<()> {
    let settings = load_settings(cli.config.as_deref(), input)?;
    let propagation = propagate_inputs(&settings)?;
    ensure_clean(input, &propagation.report)?;

    let start = propagation
        .tree
        .index_of(tax_id)
        .ok_or_else(|| CliError::InvalidArgs(format!("tax id not found: {tax_id}")))?;
    output::info(&propagation.tree.subtree_string(start, depth));
    Ok(())
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(cli.config.as_deref())?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::info(&format!("global: {}", path.display())),
                None => output::warning("cannot determine global config directory"),
            }
            if let Some(path) = &cli.config {
                output::info(&format!("file:   {}", path.display()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StructuralIssue;
    use crate::exitcode;
    use crate::util::testing::{edges, observations};

    fn report_with_detached() -> PropagationReport {
        CopyNumberService::default()
            .run(
                edges(&[("1", "1"), ("2", "1"), ("5", "6")]),
                &RemapTable::new(),
                observations(&[("2", 3.0)]),
            )
            .unwrap()
            .report
    }

    #[test]
    fn given_structural_issue_when_strict_then_dataerr() {
        let report = report_with_detached();
        assert!(report.structural.contains(&StructuralIssue::Detached {
            head: "6".into(),
            size: 2
        }));

        let strict = InputArgs {
            strict: true,
            ..Default::default()
        };
        let err = ensure_clean(&strict, &report).unwrap_err();
        assert_eq!(err.exit_code(), exitcode::DATAERR);

        assert!(ensure_clean(&InputArgs::default(), &report).is_ok());
    }

    #[test]
    fn given_no_command_when_executing_then_usage_error() {
        let cli = Cli {
            verbose: 0,
            quiet: false,
            log: None,
            config: None,
            command: None,
        };
        let err = execute_command(&cli).unwrap_err();
        assert_eq!(err.exit_code(), exitcode::USAGE);
    }
}
