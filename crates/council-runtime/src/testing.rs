//! Scripted providers for engine tests.

use async_trait::async_trait;
use council_core::{ProviderIdentity, ProviderResponse};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::providers::{ApiCredential, GenerationRequest, LlmProvider, ProviderFactory};

/// What a scripted provider does when called.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    Reply { content: String, tokens: u32 },
    Fail(String),
    Panic(String),
}

impl Script {
    pub(crate) fn reply(content: &str, tokens: u32) -> Self {
        Script::Reply {
            content: content.to_string(),
            tokens,
        }
    }

    pub(crate) fn fail(message: &str) -> Self {
        Script::Fail(message.to_string())
    }

    pub(crate) fn panic(message: &str) -> Self {
        Script::Panic(message.to_string())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub provider: ProviderIdentity,
    pub request: GenerationRequest,
}

struct ScriptedProvider {
    identity: ProviderIdentity,
    user_owned: bool,
    script: Script,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn identity(&self) -> ProviderIdentity {
        self.identity
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResponse {
        self.calls.lock().unwrap().push(RecordedCall {
            provider: self.identity,
            request: request.clone(),
        });

        let response = match &self.script {
            Script::Reply { content, tokens } => {
                ProviderResponse::success(self.identity, content.clone(), *tokens, 1)
            }
            Script::Fail(message) => ProviderResponse::failure(self.identity, message.clone(), 1),
            Script::Panic(message) => panic!("{}", message),
        };
        response.with_user_owned(self.user_owned)
    }
}

/// Factory handing out scripted providers; unscripted providers reply "ok".
#[derive(Clone, Default)]
pub(crate) struct ScriptedFactory {
    scripts: BTreeMap<ProviderIdentity, Script>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_script(mut self, provider: ProviderIdentity, script: Script) -> Self {
        self.scripts.insert(provider, script);
        self
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, provider: ProviderIdentity) -> Vec<GenerationRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.provider == provider)
            .map(|call| call.request)
            .collect()
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, credential: ApiCredential) -> Arc<dyn LlmProvider> {
        let identity = credential.provider();
        Arc::new(ScriptedProvider {
            identity,
            user_owned: credential.is_user_owned(),
            script: self
                .scripts
                .get(&identity)
                .cloned()
                .unwrap_or_else(|| Script::reply("ok", 1)),
            calls: Arc::clone(&self.calls),
        })
    }
}
