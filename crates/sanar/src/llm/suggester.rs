//! Blocking completion backend over [`LlmClient`].
//!
//! The orchestrator runs inside synchronous host callbacks, so each call
//! drives the async client to completion on a private current-thread
//! runtime, bounded by the configured timeout.

use std::time::Duration;
use tracing::debug;

use super::client::{ChatMessage, LlmClient};
use crate::config::GenerativeConfig;
use crate::result::{SanarError, SanarResult};
use crate::suggest::{CompletionBackend, GenerationError, GenerativeSuggester};

/// Suggester backed by an OpenAI-compatible server
pub type ChatSuggester = GenerativeSuggester<ChatBackend>;

/// [`CompletionBackend`] issuing one chat completion per call
#[derive(Debug)]
pub struct ChatBackend {
    client: LlmClient,
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
    temperature: f64,
    max_tokens: u32,
}

impl ChatBackend {
    /// Build a backend from configuration
    ///
    /// # Errors
    ///
    /// Returns [`SanarError::Io`] if the runtime cannot be created.
    pub fn from_config(config: &GenerativeConfig) -> SanarResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SanarError::Io)?;
        let client = LlmClient::new(&config.base_url, &config.model, timeout)
            .with_max_response_bytes(config.max_response_bytes);
        Ok(Self {
            client,
            runtime,
            timeout,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Underlying HTTP client
    pub fn client(&self) -> &LlmClient {
        &self.client
    }
}

impl CompletionBackend for ChatBackend {
    fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let call = self.client.chat_completion(
            messages,
            Some(self.temperature),
            Some(self.max_tokens),
        );
        let outcome = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, call).await });
        let response = match outcome {
            Err(_) => {
                return Err(GenerationError::transient(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                )))
            }
            Ok(Err(e)) if e.is_unrecoverable() => {
                return Err(GenerationError::unrecoverable(e.to_string()))
            }
            Ok(Err(e)) => return Err(GenerationError::transient(e.to_string())),
            Ok(Ok(response)) => response,
        };
        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion received"
            );
        }
        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::transient("response has no choices"))
    }
}

impl ChatSuggester {
    /// Suggester talking to the server named in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be built.
    pub fn from_config(config: &GenerativeConfig) -> SanarResult<Self> {
        Ok(Self::new(ChatBackend::from_config(config)?, config))
    }
}
