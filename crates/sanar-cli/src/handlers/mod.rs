//! Command handlers - extracted from main.rs for testability

pub mod config;
pub mod heal;
pub mod suggest;

pub use config::execute_config;
pub use heal::execute_heal;
pub use suggest::execute_suggest;
