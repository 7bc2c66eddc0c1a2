//! Log output for the `geomem` binary.
//!
//! Logs go to stderr so stdout carries only command output (JSON exports,
//! entry listings). Verbosity follows `RUST_LOG`, defaulting to
//! [`DEFAULT_FILTER`].

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "geomemories=info";

/// Install the global subscriber. A second call is a no-op.
///
/// Colors are only used when stderr is a terminal.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .ok();
}
