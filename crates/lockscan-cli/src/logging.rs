//! Logging initialization for the CLI.
//!
//! Library crates only emit `tracing` events; the subscriber lives here.
//! Everything goes to stderr so JSON on stdout stays parseable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directive for a `-v` count: 0 = warn, 1 = debug, 2+ = trace.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `-v`.
///
/// A second call is a no-op.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
