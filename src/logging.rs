//! Logging initialization
//!
//! Structured logging through `tracing`, filtered via `NOXUP_LOG` (or
//! the verbosity flag) so sessions are debuggable without recompiling.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable controlling the log filter
pub const LOG_ENV_VAR: &str = "NOXUP_LOG";

/// Initialize the global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "noxup=debug" } else { "noxup=info" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init(false);
        init(true);
    }
}
