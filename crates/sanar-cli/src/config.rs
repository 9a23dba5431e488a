//! CLI configuration

use sanar::HealConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliResult;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// From `-q` and the `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Log filter used when `RUST_LOG` is unset
    #[must_use]
    pub const fn default_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stdout().is_term(),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Healing configuration file, if any
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set JSON logging
    #[must_use]
    pub const fn with_log_json(mut self, log_json: bool) -> Self {
        self.log_json = log_json;
        self
    }

    /// Set the healing configuration file
    #[must_use]
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Healing configuration from the file, or defaults without one
    pub fn heal_config(&self) -> CliResult<HealConfig> {
        load_heal_config(self.config_path.as_deref())
    }
}

/// Load and validate a healing configuration file
pub fn load_heal_config(path: Option<&Path>) -> CliResult<HealConfig> {
    let config = match path {
        Some(path) => HealConfig::from_file(path)?,
        None => HealConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::CliError;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_default_verbosity() {
            assert_eq!(Verbosity::default(), Verbosity::Normal);
        }

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 2), Verbosity::Debug);
        }

        #[test]
        fn test_default_filter() {
            assert_eq!(Verbosity::Quiet.default_filter(), "error");
            assert_eq!(Verbosity::Normal.default_filter(), "warn");
            assert_eq!(Verbosity::Debug.default_filter(), "debug");
        }

        #[test]
        fn test_is_verbose() {
            assert!(!Verbosity::Quiet.is_verbose());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Verbose.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
        }
    }

    mod color_tests {
        use super::*;

        #[test]
        fn test_explicit_choices() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }
    }

    mod heal_config_tests {
        use super::*;

        #[test]
        fn test_defaults_without_file() {
            let config = CliConfig::new().heal_config().unwrap();
            assert_eq!(config.max_retries, 3);
        }

        #[test]
        fn test_file_loaded() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("sanar.yaml");
            std::fs::write(&path, "max_retries: 5\noutput_dir: out\n").unwrap();
            let config = load_heal_config(Some(&path)).unwrap();
            assert_eq!(config.max_retries, 5);
            assert_eq!(config.output_dir, PathBuf::from("out"));
        }

        #[test]
        fn test_invalid_file_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("sanar.yaml");
            std::fs::write(&path, "max_candidates: 0\n").unwrap();
            assert!(matches!(load_heal_config(Some(&path)), Err(CliError::Sanar(_))));
        }
    }
}
