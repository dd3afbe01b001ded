use tracing_subscriber::EnvFilter;

use crate::config::LOG_ENV;

/// Route diagnostics to stderr so stdout only carries command output.
/// Filter comes from `NOTES_LOG` (e.g. `debug`, `notes_cli=trace`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
