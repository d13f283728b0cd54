//! Perplexity provider. Fact checker in consensus mode.
//!
//! Same chat shape as OpenAI, plus a top-level `citations` array that is
//! carried into the response metadata.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::chat::{ChatCompletionRequest, ChatCompletionResponse};
use super::transport::send_json;
use super::{ApiCredential, Completion, Endpoint, GenerationRequest, ProviderError};
use crate::config::ProviderSettings;

pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_MODEL: &str = "sonar-pro";

/// Metadata key holding the source URLs.
pub const CITATIONS_KEY: &str = "citations";

#[derive(Debug, Deserialize)]
struct PerplexityResponse {
    #[serde(flatten)]
    chat: ChatCompletionResponse,
    /// Forwarded as-is; entries are usually URLs but not guaranteed to be strings.
    #[serde(default)]
    citations: Vec<JsonValue>,
}

#[derive(Debug)]
pub struct PerplexityProvider {
    credential: ApiCredential,
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl PerplexityProvider {
    pub fn new(credential: ApiCredential, settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self {
            credential,
            endpoint: Endpoint::resolve(settings, DEFAULT_BASE_URL, DEFAULT_MODEL),
            client,
        }
    }

    pub fn credential(&self) -> &ApiCredential {
        &self.credential
    }

    pub(crate) async fn complete(&self, request: &GenerationRequest) -> Result<Completion, ProviderError> {
        let body = ChatCompletionRequest::new(&self.endpoint.model, request);
        let http = self
            .client
            .post(self.endpoint.url("chat/completions"))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.credential.expose()),
            )
            .json(&body);

        let response: PerplexityResponse = send_json(http, self.endpoint.timeout).await?;
        let tokens = response.chat.total_tokens();
        let citations = response.citations;
        let completion = Completion::new(response.chat.into_content()?, tokens);

        if citations.is_empty() {
            return Ok(completion);
        }
        Ok(completion.with_metadata(CITATIONS_KEY, JsonValue::Array(citations)))
    }
}
