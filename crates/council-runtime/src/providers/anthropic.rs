//! Anthropic Claude provider. Preferred style analyst.
//!
//! Uses the Messages API: the system prompt travels as a top-level field,
//! the reply is a list of content blocks, and token usage is split into
//! input and output counts.

use serde::{Deserialize, Serialize};

use super::transport::send_json;
use super::{ApiCredential, Completion, Endpoint, GenerationRequest, ProviderError};
use crate::config::ProviderSettings;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Value of the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
///
/// The key is stored as an [`ApiCredential`], so it cannot be printed via
/// `Debug` or `Display` and is zeroed on drop.
#[derive(Debug)]
pub struct AnthropicProvider {
    credential: ApiCredential,
    endpoint: Endpoint,
    client: reqwest::Client,
}

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Text { text: &'a str },
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicProvider {
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
        let body = AnthropicRequest {
            model: &self.endpoint.model,
            max_tokens: request.max_tokens,
            system: request.system_prompt.as_deref(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![ContentBlock::Text {
                    text: &request.prompt,
                }],
            }],
            temperature: request.temperature,
        };

        // Only expose the credential here, at the point of use
        let http = self
            .client
            .post(self.endpoint.url("messages"))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let response: AnthropicResponse = send_json(http, self.endpoint.timeout).await?;

        let content = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(Completion::new(
            content,
            response
                .usage
                .input_tokens
                .saturating_add(response.usage.output_tokens),
        ))
    }
}
