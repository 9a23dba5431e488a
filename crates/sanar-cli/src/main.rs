//! Sanador CLI: self-healing locators for UI test automation
//!
//! ## Usage
//!
//! ```bash
//! sanador heal results/ledger.json            # Rewrite scripts, write reports
//! sanador suggest --tree page.html --locator id=user-name --intent text-entry
//! sanador config --show                       # Print effective configuration
//! ```

use clap::Parser;
use sanador::{
    handlers::{execute_config, execute_heal, execute_suggest},
    logging, Cli, CliConfig, CliResult, ColorChoice, Commands, Reporter, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(&config)?;
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());

    match cli.command {
        Commands::Heal(args) => execute_heal(&config, &args, &reporter).map(|_| ()),
        Commands::Suggest(args) => {
            print!("{}", execute_suggest(&config, &args)?);
            Ok(())
        }
        Commands::Config(args) => {
            print!("{}", execute_config(&config, &args)?);
            Ok(())
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_log_json(cli.log_json)
        .with_config_path(cli.config.clone())
}
