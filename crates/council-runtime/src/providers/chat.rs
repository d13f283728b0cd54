//! OpenAI-compatible chat completions wire format.
//!
//! DeepSeek, OpenAI and Perplexity all accept this shape.

use serde::{Deserialize, Serialize};

use super::transport::send_json;
use super::{ApiCredential, ChatMessage, Completion, Endpoint, GenerationRequest, ProviderError};

/// POST `{base_url}/chat/completions` with bearer auth.
pub(crate) async fn complete_with_bearer(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    credential: &ApiCredential,
    request: &GenerationRequest,
) -> Result<Completion, ProviderError> {
    let body = ChatCompletionRequest::new(&endpoint.model, request);
    let http = client
        .post(endpoint.url("chat/completions"))
        .bearer_auth(credential.expose())
        .json(&body);

    let response: ChatCompletionResponse = send_json(http, endpoint.timeout).await?;
    let tokens = response.total_tokens();
    Ok(Completion::new(response.into_content()?, tokens))
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

impl<'a> ChatCompletionRequest<'a> {
    pub(crate) fn new(model: &'a str, request: &GenerationRequest) -> Self {
        Self {
            model,
            messages: request.messages(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u32,
}

impl ChatCompletionResponse {
    /// Text of the first choice.
    pub(crate) fn into_content(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))
    }

    pub(crate) fn total_tokens(&self) -> u32 {
        self.usage.as_ref().map_or(0, |usage| usage.total_tokens)
    }
}
