//! LLM provider adapters.
//!
//! Every adapter turns a [`GenerationRequest`] into exactly one
//! [`ProviderResponse`]. Transport and API failures never escape as errors:
//! they are timed and recorded on a failed response.
//!
//! ## Security
//!
//! Adapters hold their key as an [`ApiCredential`] and only expose it when
//! building the outgoing request.

use async_trait::async_trait;
use council_core::prompts::HEALTH_CHECK_PROMPT;
use council_core::{ProviderIdentity, ProviderResponse};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::ProviderSettings;

mod anthropic;
mod chat;
mod deepseek;
mod factory;
mod openai;
mod perplexity;
pub mod secrets;
mod transport;

pub use anthropic::AnthropicProvider;
pub use deepseek::DeepSeekProvider;
pub use factory::{HttpProviderFactory, ProviderFactory};
pub use openai::OpenAiProvider;
pub use perplexity::PerplexityProvider;
pub use secrets::{ApiCredential, CredentialOwner, CredentialResolver};

/// Token budget used when a request does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Sampling temperature used when a request does not set one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Token budget for health probes.
pub const HEALTH_CHECK_MAX_TOKENS: u32 = 10;

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// System message (if any) followed by the user message.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.push(ChatMessage::user(self.prompt.as_str()));
        messages
    }
}

/// A chat message in the OpenAI-compatible wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// "system" or "user"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Successful output of a provider call, before timing is attached.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: String,
    pub tokens_used: u32,
    pub metadata: BTreeMap<String, JsonValue>,
}

impl Completion {
    pub fn new(content: impl Into<String>, tokens_used: u32) -> Self {
        Self {
            content: content.into(),
            tokens_used,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Resolved endpoint for one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Endpoint {
    /// Apply overrides from `settings` on top of the adapter defaults.
    pub fn resolve(settings: &ProviderSettings, default_base_url: &str, default_model: &str) -> Self {
        Self {
            base_url: settings
                .base_url
                .as_deref()
                .unwrap_or(default_base_url)
                .trim_end_matches('/')
                .to_string(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            timeout: settings.timeout_or_default(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Provider abstraction used by the orchestrator.
///
/// `generate` never fails: a failure is a [`ProviderResponse`] with
/// `success == false`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn identity(&self) -> ProviderIdentity;

    /// Execute one generation call.
    async fn generate(&self, request: &GenerationRequest) -> ProviderResponse;

    /// Minimal live probe.
    async fn health_check(&self) -> bool {
        let request =
            GenerationRequest::new(HEALTH_CHECK_PROMPT).with_max_tokens(HEALTH_CHECK_MAX_TOKENS);
        self.generate(&request).await.is_success()
    }
}

/// The closed set of HTTP adapters.
#[derive(Debug)]
pub enum ProviderAdapter {
    DeepSeek(DeepSeekProvider),
    Perplexity(PerplexityProvider),
    Anthropic(AnthropicProvider),
    OpenAi(OpenAiProvider),
}

impl ProviderAdapter {
    /// Build the adapter matching the credential's provider.
    pub fn new(credential: ApiCredential, settings: &ProviderSettings, client: reqwest::Client) -> Self {
        match credential.provider() {
            ProviderIdentity::DeepSeek => {
                Self::DeepSeek(DeepSeekProvider::new(credential, settings, client))
            }
            ProviderIdentity::Perplexity => {
                Self::Perplexity(PerplexityProvider::new(credential, settings, client))
            }
            ProviderIdentity::Anthropic => {
                Self::Anthropic(AnthropicProvider::new(credential, settings, client))
            }
            ProviderIdentity::OpenAi => {
                Self::OpenAi(OpenAiProvider::new(credential, settings, client))
            }
        }
    }

    fn credential(&self) -> &ApiCredential {
        match self {
            Self::DeepSeek(p) => p.credential(),
            Self::Perplexity(p) => p.credential(),
            Self::Anthropic(p) => p.credential(),
            Self::OpenAi(p) => p.credential(),
        }
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<Completion, ProviderError> {
        match self {
            Self::DeepSeek(p) => p.complete(request).await,
            Self::Perplexity(p) => p.complete(request).await,
            Self::Anthropic(p) => p.complete(request).await,
            Self::OpenAi(p) => p.complete(request).await,
        }
    }
}

#[async_trait]
impl LlmProvider for ProviderAdapter {
    fn identity(&self) -> ProviderIdentity {
        self.credential().provider()
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResponse {
        let identity = self.identity();
        let started = Instant::now();
        let outcome = self.complete(request).await;
        let duration_ms = elapsed_ms(started);

        let response = match outcome {
            Ok(completion) => {
                tracing::debug!(
                    provider = %identity,
                    tokens = completion.tokens_used,
                    duration_ms,
                    "Provider call succeeded"
                );
                completion.metadata.into_iter().fold(
                    ProviderResponse::success(
                        identity,
                        completion.content,
                        completion.tokens_used,
                        duration_ms,
                    ),
                    |response, (key, value)| response.with_metadata(key, value),
                )
            }
            Err(e) => {
                tracing::error!(provider = %identity, error = %e, duration_ms, "Provider call failed");
                ProviderResponse::failure(identity, e.to_string(), duration_ms)
            }
        };

        response.with_user_owned(self.credential().is_user_owned())
    }
}

/// Milliseconds since `started`, saturating.
pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
