//! OpenAI provider. Fallback style analyst.

use super::chat::complete_with_bearer;
use super::{ApiCredential, Completion, Endpoint, GenerationRequest, ProviderError};
use crate::config::ProviderSettings;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

#[derive(Debug)]
pub struct OpenAiProvider {
    credential: ApiCredential,
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl OpenAiProvider {
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
        complete_with_bearer(&self.client, &self.endpoint, &self.credential, request).await
    }
}
