//! Logging initialization.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the process-wide fmt subscriber at `info` level.
///
/// `RUST_LOG` overrides the default level. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
