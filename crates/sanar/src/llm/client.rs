//! OpenAI-compatible HTTP client for locator suggestions.
//!
//! Works against ollama, llama.cpp, vLLM and any server exposing the
//! OpenAI `/v1/chat/completions` API.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Parameters for a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier (may be ignored by some backends).
    pub model: String,
    /// The messages for the chat completion.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature (0.0 = deterministic).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Ask for a JSON object where the server supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Structured-output hint.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    /// Format name, `json_object`
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    /// JSON object output
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated.
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion).
    pub total_tokens: u32,
}

/// A single completion choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponseChoice {
    /// Index of this choice.
    pub index: u32,
    /// The generated message.
    pub message: ChatMessage,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
}

/// Response from a chat completion endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    /// Unique identifier for this completion.
    #[serde(default)]
    pub id: String,
    /// Model used.
    #[serde(default)]
    pub model: String,
    /// Generated choices.
    pub choices: Vec<ChatResponseChoice>,
    /// Token usage statistics.
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Content of the first choice
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Errors from the LLM client.
#[derive(Debug, thiserror::Error)]
pub enum LlmClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server returned an error status.
    #[error("API error {status}: {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Response body exceeded the configured size.
    #[error("response of {size} bytes exceeds limit of {limit}")]
    TooLarge {
        /// Bytes received
        size: usize,
        /// Configured limit
        limit: usize,
    },
}

impl LlmClientError {
    /// Whether repeating the request cannot help.
    ///
    /// Refused connections and client-side HTTP statuses (bad URL, missing
    /// credentials, unknown model) are permanent for the run; timeouts,
    /// rate limits and server errors are not.
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_builder(),
            Self::ApiError { status, .. } => (400..500).contains(status) && *status != 429,
            Self::TooLarge { .. } => false,
        }
    }
}

/// OpenAI-compatible HTTP client.
#[derive(Debug, Clone)]
pub struct LlmClient {
    base_url: String,
    client: reqwest::Client,
    model: String,
    max_response_bytes: usize,
}

impl LlmClient {
    /// Create a new client pointing at the given base URL.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the API server (e.g., `http://localhost:11434`)
    /// * `model` - Model name to include in requests
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::with_client(base_url, model, client)
    }

    /// Create a client with a custom reqwest client.
    pub fn with_client(
        base_url: impl Into<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            model: model.into(),
            max_response_bytes: 64 * 1024,
        }
    }

    /// Reject response bodies larger than `limit` bytes.
    #[must_use]
    pub const fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat completion request.
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> Result<ChatResponse, LlmClientError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens,
            response_format: Some(ResponseFormat::json_object()),
        };
        let url = format!("{}/v1/chat/completions", self.base_url);

        let resp = self.client.post(&url).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmClientError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        // JSON envelope overhead on top of the model's own output
        let limit = self.max_response_bytes.saturating_mul(2);
        if let Some(len) = resp.content_length() {
            if len as usize > limit {
                return Err(LlmClientError::TooLarge {
                    size: len as usize,
                    limit,
                });
            }
        }
        let bytes = resp.bytes().await?;
        if bytes.len() > limit {
            return Err(LlmClientError::TooLarge {
                size: bytes.len(),
                limit,
            });
        }
        let response: ChatResponse = serde_json::from_slice(&bytes).map_err(|e| {
            LlmClientError::ApiError {
                status: status.as_u16(),
                body: format!("undecodable response: {e}"),
            }
        })?;
        Ok(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new("http://localhost:11434", "llama3.1", Duration::from_secs(5));
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.model(), "llama3.1");
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = LlmClient::new("http://localhost:11434/", "model", Duration::from_secs(5));
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_chat_request_serialization() {
        let req = ChatRequest {
            model: "test".to_string(),
            messages: vec![ChatMessage::user("Hi")],
            temperature: Some(0.0),
            max_tokens: Some(32),
            response_format: Some(ResponseFormat::json_object()),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"temperature\":0.0"));
        assert!(json.contains("\"max_tokens\":32"));
        assert!(json.contains("\"type\":\"json_object\""));
    }

    #[test]
    fn test_chat_request_omits_none_fields() {
        let req = ChatRequest {
            model: "test".to_string(),
            messages: vec![],
            temperature: None,
            max_tokens: None,
            response_format: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("temperature"));
        assert!(!json.contains("max_tokens"));
        assert!(!json.contains("response_format"));
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "llama3.1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"suggestions\": [\"css=#a\"]}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_content(), Some("{\"suggestions\": [\"css=#a\"]}"));
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_response_with_name_null_and_no_usage() {
        let json = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"{}","name":null},"finish_reason":"stop"}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_content(), Some("{}"));
        assert_eq!(resp.choices[0].message.role, Role::Assistant);
        assert!(resp.usage.is_none());
    }

    #[test]
    fn test_status_classification() {
        let api = |status| LlmClientError::ApiError {
            status,
            body: String::new(),
        };
        assert!(api(401).is_unrecoverable());
        assert!(api(404).is_unrecoverable());
        assert!(!api(429).is_unrecoverable());
        assert!(!api(503).is_unrecoverable());
        assert!(!LlmClientError::TooLarge { size: 2, limit: 1 }.is_unrecoverable());
    }

    #[tokio::test]
    async fn test_refused_connection_is_unrecoverable() {
        // port 9 (discard) is closed on test hosts
        let client = LlmClient::new("http://127.0.0.1:9", "m", Duration::from_secs(2));
        let err = client
            .chat_completion(vec![ChatMessage::user("hi")], None, None)
            .await
            .unwrap_err();
        assert!(err.is_unrecoverable());
    }
}
