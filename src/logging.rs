//! Diagnostic logging to stderr.
//!
//! stdout carries the report (and `--json` output), so all tracing goes to
//! stderr. `RUST_LOG` is honoured; `-v` flags raise this crate's level on top
//! of it.

use tracing_subscriber::{EnvFilter, fmt};

/// Crate log level for a count of `-v` flags.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(verbosity: u8) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("lostfound_compress={}", level_for(verbosity)).parse() {
        filter = filter.add_directive(directive);
    }
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
