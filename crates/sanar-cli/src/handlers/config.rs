//! Config command handler

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::ConfigArgs;

/// Execute the config command, returning what to print
pub fn execute_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<String> {
    let heal_config = config.heal_config()?;
    if args.show {
        return Ok(heal_config.to_yaml()?);
    }
    let source = config
        .config_path
        .as_ref()
        .map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());
    Ok(format!("Configuration valid ({source})\n"))
}
