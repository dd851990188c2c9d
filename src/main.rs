use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use rrat::cli::output;
use rrat::cli::{execute_command, Cli};
use rrat::exitcode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose, cli.quiet, cli.log.as_deref()) {
        output::error(&format!("cannot open log file: {e}"));
        std::process::exit(exitcode::CANTCREAT);
    }

    if let Err(e) = execute_command(&cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = match (quiet, verbosity) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, 3) => LevelFilter::TRACE,
        _ => {
            eprintln!("Don't be crazy, max is -v -v -v");
            LevelFilter::TRACE
        }
    };

    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    // Create a noisy module filter
    let noisy_modules = ["config::"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(verbosity > 1)
        .with_thread_names(false)
        .with_span_events(if verbosity > 2 {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    let filtered_layer = fmt_layer.with_filter(filter).with_filter(module_filter);

    tracing_subscriber::registry().with(filtered_layer).init();

    match filter {
        LevelFilter::INFO => tracing::info!("Debug mode: info"),
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rrat::util::testing;
    use tracing::info;

    // https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing
    #[test]
    fn verify_cli() {
        testing::init_test_setup();
        use clap::CommandFactory;
        Cli::command().debug_assert();
        info!("Debug mode: info");
    }

    #[test]
    fn given_query_args_when_parsing_then_collects_tax_ids() {
        let cli = Cli::try_parse_from([
            "rrat",
            "-vv",
            "query",
            "--nodes",
            "nodes.csv",
            "--rrndb",
            "rrndb.tsv",
            "--aggregation",
            "median-low",
            "562",
            "1280",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(rrat::cli::Commands::Query { input, tax_ids }) => {
                assert_eq!(tax_ids, vec!["562", "1280"]);
                assert_eq!(
                    input.aggregation,
                    Some(rrat::domain::AggregationPolicy::MedianLow)
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
