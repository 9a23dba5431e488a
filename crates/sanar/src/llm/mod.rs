//! Generative suggestions over OpenAI-compatible chat APIs.
//!
//! - **Client**: async HTTP client for `/v1/chat/completions`
//! - **Suggester**: blocking [`CompletionBackend`](crate::suggest::CompletionBackend)
//!   plugged into [`GenerativeSuggester`](crate::suggest::GenerativeSuggester)

pub mod client;
pub mod suggester;

pub use client::{
    ChatMessage, ChatRequest, ChatResponse, ChatResponseChoice, LlmClient, LlmClientError,
    ResponseFormat, Role, Usage,
};
pub use suggester::{ChatBackend, ChatSuggester};
