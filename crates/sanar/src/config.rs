//! Healing configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::result::{SanarError, SanarResult};
use crate::synth::DEFAULT_MAX_CANDIDATES;

/// Where candidate locators come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorSource {
    /// Tree-based synthesis plus ranking
    #[default]
    Heuristic,
    /// A generative model, validated by the same ranking
    Generative,
}

/// Generative backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    /// Base URL of an OpenAI-compatible server
    pub base_url: String,
    /// Model name sent with each request
    pub model: String,
    /// Requests per generation round before giving up
    pub max_attempts: u32,
    /// Completion token limit
    pub max_tokens: u32,
    /// Responses larger than this are rejected unread
    pub max_response_bytes: usize,
    /// UI tree characters included in the prompt
    pub max_tree_chars: usize,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Sampling temperature
    pub temperature: f64,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            max_attempts: 3,
            max_tokens: 1024,
            max_response_bytes: 64 * 1024,
            max_tree_chars: 60_000,
            timeout_secs: 60,
            temperature: 0.0,
        }
    }
}

/// Healing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Generation rounds per failed action
    pub max_retries: u32,
    /// Candidates kept per round
    pub max_candidates: usize,
    /// Candidate source
    pub locator_source: LocatorSource,
    /// Drop unclickable candidates for click-family keywords
    pub require_clickable_for_clicks: bool,
    /// Artifacts directory (healed files, reports, diffs)
    pub output_dir: PathBuf,
    /// Base directory mirrored under `output_dir`; defaults to the
    /// common parent of the healed files
    pub source_root: Option<PathBuf>,
    /// Generative backend
    pub generative: GenerativeConfig,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            locator_source: LocatorSource::Heuristic,
            require_clickable_for_clicks: true,
            output_dir: PathBuf::from("sanar-results"),
            source_root: None,
            generative: GenerativeConfig::default(),
        }
    }
}

impl HealConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML configuration
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML or out-of-range values.
    pub fn from_yaml(yaml: &str) -> SanarResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load YAML configuration from `path`
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::FileRead`] when the file cannot be read, or any
    /// error [`HealConfig::from_yaml`] returns.
    pub fn from_file(path: &Path) -> SanarResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SanarError::read(path, e))?;
        Self::from_yaml(&text)
    }

    /// Serialize as YAML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> SanarResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::Config`] naming the offending field.
    pub fn validate(&self) -> SanarResult<()> {
        if self.max_retries == 0 {
            return Err(SanarError::config("max_retries must be at least 1"));
        }
        if self.max_candidates == 0 {
            return Err(SanarError::config("max_candidates must be at least 1"));
        }
        if self.locator_source == LocatorSource::Generative {
            if self.generative.max_attempts == 0 {
                return Err(SanarError::config("generative.max_attempts must be at least 1"));
            }
            if self.generative.base_url.trim().is_empty() {
                return Err(SanarError::config("generative.base_url is empty"));
            }
        }
        Ok(())
    }

    /// Set the retry budget
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the candidate cap
    #[must_use]
    pub const fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Set the candidate source
    #[must_use]
    pub const fn with_locator_source(mut self, source: LocatorSource) -> Self {
        self.locator_source = source;
        self
    }

    /// Enable or disable the clickable filter
    #[must_use]
    pub const fn with_require_clickable(mut self, require: bool) -> Self {
        self.require_clickable_for_clicks = require;
        self
    }

    /// Set the artifacts directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the mirrored source root
    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }
}
