//! Generative locator suggestions.
//!
//! The model call itself sits behind [`CompletionBackend`]; this module owns
//! the request shape, the prompt, and validation of whatever comes back.
//! Malformed, empty and oversized responses are rejected and the call is
//! repeated, up to `max_attempts` times per generation round.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::Technology;
use crate::config::GenerativeConfig;
use crate::tree::UiTree;

/// Failure context handed to a suggester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    /// Error text the failed keyword reported
    pub error_message: String,
    /// Locator that no longer matches
    pub failed_locator: String,
    /// Keyword that failed
    pub keyword_name: String,
    /// Serialized UI tree at failure time
    pub ui_tree: String,
    /// Locators already tried for this action; never suggested again
    pub tried_locators: Vec<String>,
    /// Technology the keyword belongs to
    pub technology: Technology,
}

/// What a suggester produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionResponse {
    /// Candidate locators in model-preferred order
    Suggestions(Vec<String>),
    /// The failure is not a locator problem after all
    NoHealingNeeded,
}

/// Generation failures, split by whether retrying can help
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Worth another round while budget remains
    #[error("transient generation failure: {message}")]
    Transient {
        /// Error message
        message: String,
    },
    /// The backend cannot serve this run (unreachable, unauthorized)
    #[error("unrecoverable generation failure: {message}")]
    Unrecoverable {
        /// Error message
        message: String,
    },
}

impl GenerationError {
    /// Create a transient failure
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create an unrecoverable failure
    #[must_use]
    pub fn unrecoverable(message: impl Into<String>) -> Self {
        Self::Unrecoverable {
            message: message.into(),
        }
    }

    /// Whether the orchestrator should give up on the action
    #[must_use]
    pub const fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Unrecoverable { .. })
    }
}

/// Source of candidate locators for a failure
pub trait LocatorSuggester {
    /// Suggest replacements for the failed locator in `request`
    fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionResponse, GenerationError>;
}

/// One completion call against a generative model
pub trait CompletionBackend {
    /// Complete `user` under `system` instructions, returning raw model text
    fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError>;
}

const SYSTEM_PROMPT: &str = "You repair broken UI test locators. \
Given a failing locator, the error it produced and the current UI tree, \
reply with JSON only: {\"suggestions\": [\"<locator>\", ...]} listing up to \
five replacement locators, best first. Prefix each with css= or xpath=. \
Every locator must match exactly one element in the tree. \
If the error is not caused by a missing element, reply \
{\"no_healing_needed\": true}.";

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    suggestions: Option<Vec<String>>,
    #[serde(default)]
    no_healing_needed: bool,
}

/// Suggester that validates a backend's output with bounded retries
#[derive(Debug, Clone)]
pub struct GenerativeSuggester<B> {
    backend: B,
    max_attempts: u32,
    max_response_bytes: usize,
    max_tree_chars: usize,
}

impl<B: CompletionBackend> GenerativeSuggester<B> {
    /// Wrap `backend` with limits from `config`
    #[must_use]
    pub fn new(backend: B, config: &GenerativeConfig) -> Self {
        Self {
            backend,
            max_attempts: config.max_attempts.max(1),
            max_response_bytes: config.max_response_bytes,
            max_tree_chars: config.max_tree_chars,
        }
    }

    /// The wrapped backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: CompletionBackend> LocatorSuggester for GenerativeSuggester<B> {
    fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionResponse, GenerationError> {
        let prompt = build_prompt(request, self.max_tree_chars);
        let mut last = GenerationError::transient("no attempt made");
        for attempt in 1..=self.max_attempts {
            let raw = match self.backend.complete(SYSTEM_PROMPT, &prompt) {
                Ok(raw) => raw,
                Err(e) if e.is_unrecoverable() => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "completion failed");
                    last = e;
                    continue;
                }
            };
            match parse_response(&raw, self.max_response_bytes, &request.tried_locators) {
                Ok(response) => {
                    debug!(attempt, locator = %request.failed_locator, "suggestions accepted");
                    return Ok(response);
                }
                Err(reason) => {
                    warn!(attempt, reason = %reason, "response rejected");
                    last = GenerationError::transient(reason);
                }
            }
        }
        Err(last)
    }
}

/// User prompt for `request`, with the tree reduced to `max_tree_chars`
#[must_use]
pub fn build_prompt(request: &SuggestionRequest, max_tree_chars: usize) -> String {
    let tree = match UiTree::parse(&request.ui_tree) {
        Ok(tree) => tree.to_prompt_markup(max_tree_chars),
        Err(_) => request.ui_tree.chars().take(max_tree_chars).collect(),
    };
    let mut prompt = format!(
        "Library: {}\nKeyword: {}\nFailed locator: {}\nError: {}\n",
        request.technology.library_name(),
        request.keyword_name,
        request.failed_locator,
        request.error_message.trim(),
    );
    if !request.tried_locators.is_empty() {
        prompt.push_str("Already tried, do not suggest again:\n");
        for tried in &request.tried_locators {
            prompt.push_str("- ");
            prompt.push_str(tried);
            prompt.push('\n');
        }
    }
    prompt.push_str("UI tree:\n");
    prompt.push_str(&tree);
    prompt
}

/// Validate raw model output.
///
/// Accepts a JSON object, optionally wrapped in prose or a code fence.
/// Suggestions are trimmed, blanks and previously tried locators dropped;
/// a response left with nothing is rejected.
pub fn parse_response(
    raw: &str,
    max_bytes: usize,
    tried: &[String],
) -> Result<SuggestionResponse, String> {
    if raw.len() > max_bytes {
        return Err(format!("response of {} bytes exceeds {max_bytes}", raw.len()));
    }
    let body = extract_object(raw).ok_or_else(|| "no JSON object in response".to_string())?;
    let parsed: RawResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {e}"))?;
    if parsed.no_healing_needed {
        return Ok(SuggestionResponse::NoHealingNeeded);
    }
    let mut out: Vec<String> = Vec::new();
    for suggestion in parsed.suggestions.unwrap_or_default() {
        let suggestion = suggestion.trim();
        if suggestion.is_empty()
            || tried.iter().any(|t| t == suggestion)
            || out.iter().any(|s| s == suggestion)
        {
            continue;
        }
        out.push(suggestion.to_string());
    }
    if out.is_empty() {
        return Err("response carries no new suggestions".to_string());
    }
    Ok(SuggestionResponse::Suggestions(out))
}

/// Outermost `{...}` span of `raw`
fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
