//! Log output for the command-line tool.

use std::io;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "dc_flex=info";

/// Filter used with `--quiet` when `RUST_LOG` is not set.
pub const QUIET_DIRECTIVE: &str = "dc_flex=warn";

/// Installs a stderr `fmt` subscriber; stdout stays free for the report.
///
/// `RUST_LOG` takes precedence over both built-in directives. Calling this
/// more than once leaves the first subscriber in place.
pub fn init_tracing(quiet: bool) {
    let fallback = if quiet { QUIET_DIRECTIVE } else { DEFAULT_DIRECTIVE };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
