//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use sanar::ActionIntent;
use std::path::PathBuf;

/// Sanador: CLI for Sanar - self-healing locators for UI test automation
#[derive(Parser, Debug)]
#[command(name = "sanador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Healing configuration file (YAML)
    #[arg(short, long, env = "SANAR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rewrite scripts and write reports from a saved heal ledger
    Heal(HealArgs),

    /// Suggest replacement locators from a saved UI snapshot
    Suggest(SuggestArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the heal command
#[derive(Parser, Debug)]
pub struct HealArgs {
    /// Ledger JSON written during the run
    pub ledger: PathBuf,

    /// Output directory for healed scripts and reports
    #[arg(short, long, env = "SANAR_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Base directory mirrored below the healed output
    #[arg(long)]
    pub source_root: Option<PathBuf>,
}

/// Arguments for the suggest command
#[derive(Parser, Debug)]
pub struct SuggestArgs {
    /// UI snapshot: HTML page or Appium page source
    #[arg(long)]
    pub tree: PathBuf,

    /// Locator that stopped matching
    #[arg(short, long)]
    pub locator: String,

    /// What the failed keyword did to its element
    #[arg(short, long, default_value = "generic")]
    pub intent: IntentArg,

    /// Library owning the keyword (Browser, SeleniumLibrary, AppiumLibrary)
    #[arg(long, default_value = "SeleniumLibrary")]
    pub library: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: SuggestFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration as YAML
    #[arg(long)]
    pub show: bool,
}

/// Action intent argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntentArg {
    /// Typing into a field
    TextEntry,
    /// Clicking or toggling
    Click,
    /// Choosing from a list
    Select,
    /// Reading text
    Read,
    /// Unknown or other
    #[default]
    Generic,
}

impl From<IntentArg> for ActionIntent {
    fn from(arg: IntentArg) -> Self {
        match arg {
            IntentArg::TextEntry => Self::TextEntry,
            IntentArg::Click => Self::Click,
            IntentArg::Select => Self::Select,
            IntentArg::Read => Self::Read,
            IntentArg::Generic => Self::Generic,
        }
    }
}

/// Suggest output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SuggestFormat {
    /// One candidate per line
    #[default]
    Text,
    /// JSON array
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_heal_args() {
            let cli = Cli::try_parse_from([
                "sanador",
                "heal",
                "run/ledger.json",
                "--output-dir",
                "out",
                "--source-root",
                "tests",
            ])
            .unwrap();
            let Commands::Heal(args) = cli.command else {
                panic!("expected heal");
            };
            assert_eq!(args.ledger, PathBuf::from("run/ledger.json"));
            assert_eq!(args.output_dir, Some(PathBuf::from("out")));
            assert_eq!(args.source_root, Some(PathBuf::from("tests")));
        }

        #[test]
        fn test_suggest_args() {
            let cli = Cli::try_parse_from([
                "sanador", "suggest", "--tree", "page.html", "--locator", "id=user-name", "--intent",
                "text-entry", "-v",
            ])
            .unwrap();
            assert_eq!(cli.verbose, 1);
            let Commands::Suggest(args) = cli.command else {
                panic!("expected suggest");
            };
            assert_eq!(args.intent, IntentArg::TextEntry);
            assert_eq!(args.library, "SeleniumLibrary");
            assert_eq!(ActionIntent::from(args.intent), ActionIntent::TextEntry);
        }

        #[test]
        fn test_suggest_requires_locator() {
            assert!(Cli::try_parse_from(["sanador", "suggest", "--tree", "page.html"]).is_err());
        }

        #[test]
        fn test_config_show() {
            let cli = Cli::try_parse_from(["sanador", "config", "--show", "--color", "never"]).unwrap();
            assert_eq!(cli.color, ColorArg::Never);
            assert!(matches!(cli.command, Commands::Config(ConfigArgs { show: true })));
        }
    }
}
