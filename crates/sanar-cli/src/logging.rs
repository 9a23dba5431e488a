//! Log subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Filter from `RUST_LOG`, else the verbosity's default level
#[must_use]
pub fn env_filter(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.default_filter()))
}

/// Install the global subscriber, writing to stderr
pub fn init(config: &CliConfig) -> CliResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(false);
    let result = if config.log_json {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.color.should_color()).try_init()
    };
    result.map_err(|e| CliError::logging(e.to_string()))
}
