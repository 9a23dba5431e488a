//! Sanador: command-line interface for Sanar.
//!
//! Runs the end-of-run half of healing outside the test process: rewriting
//! scripts from a saved ledger, previewing candidates for a snapshot, and
//! checking configuration.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, HealArgs, IntentArg, SuggestArgs, SuggestFormat,
};
pub use config::{load_heal_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Reporter;
