//! Test helpers: logging setup and small fixture builders.

use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{Edge, RawObservation};

static TEST_SETUP: Once = Once::new();

/// Install a global test subscriber once per process.
///
/// Honors `RUST_LOG`, defaulting to `rrat=debug`.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rrat=debug"));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_test_writer()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(env_filter),
        );

        // Only set if we haven't already set a global subscriber
        if tracing::dispatcher::has_been_set() {
            debug!("Tracing subscriber already set");
        } else {
            subscriber.try_init().unwrap_or_else(|e| {
                eprintln!("Error: Failed to set up logging: {}", e);
            });
        }
    });
}

/// Edges from `(tax_id, parent_id)` pairs.
pub fn edges(pairs: &[(&str, &str)]) -> Vec<Edge> {
    pairs.iter().map(|&(c, p)| Edge::new(c, p)).collect()
}

/// Numeric observations from `(tax_id, value)` pairs.
pub fn observations(pairs: &[(&str, f64)]) -> Vec<RawObservation> {
    pairs
        .iter()
        .map(|&(id, v)| RawObservation::number(id, v))
        .collect()
}
