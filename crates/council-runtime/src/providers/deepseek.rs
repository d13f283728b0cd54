//! DeepSeek provider. Acts as the judge in every mode.

use super::chat::complete_with_bearer;
use super::{ApiCredential, Completion, Endpoint, GenerationRequest, ProviderError};
use crate::config::ProviderSettings;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Debug)]
pub struct DeepSeekProvider {
    credential: ApiCredential,
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl DeepSeekProvider {
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
