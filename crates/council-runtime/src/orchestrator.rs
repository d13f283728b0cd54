//! The orchestration engine.
//!
//! One `process` call runs one mode:
//! - FAST: a single judge call with the general system prompt
//! - CONSENSUS: fact-check and style analysis fanned out via `tokio::join!`,
//!   then a sequential judge call that synthesizes both
//! - CREATIVE: a single judge call on a content template
//!
//! `process` never returns an error. Missing mandatory providers, judge
//! failures and panics all end up as a failed [`OrchestrationResult`].

use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use council_core::prompts::{fact_check_request, style_analysis_request};
use council_core::{
    build_judge_prompt, build_system_prompt, calculate_credits, ContentType, CostTable, Mode,
    OrchestrationError, OrchestrationResult, ProcessOptions, PromptRole, ProviderIdentity,
    ProviderResponse, ResponseRole, UserContext,
};

use crate::config::{ConfigError, EngineConfig};
use crate::observer::CallObserver;
use crate::providers::{
    elapsed_ms, CredentialResolver, GenerationRequest, HttpProviderFactory, LlmProvider,
    ProviderFactory,
};
use crate::RuntimeError;

pub const FAST_MAX_TOKENS: u32 = 2000;
pub const FAST_TEMPERATURE: f32 = 0.7;

pub const CONSENSUS_MAX_TOKENS: u32 = 2000;
pub const FACT_CHECK_TEMPERATURE: f32 = 0.3;
pub const STYLE_TEMPERATURE: f32 = 0.7;
pub const JUDGE_TEMPERATURE: f32 = 0.5;

pub const CREATIVE_MAX_TOKENS: u32 = 3000;
pub const CREATIVE_TEMPERATURE: f32 = 0.8;

/// Output of one mode run, before the common post-step.
struct ModeOutcome {
    final_text: String,
    responses: BTreeMap<ResponseRole, ProviderResponse>,
    failure: Option<OrchestrationError>,
}

impl ModeOutcome {
    /// The judge's response decides the final text and overall success.
    fn judged(
        mut responses: BTreeMap<ResponseRole, ProviderResponse>,
        role: ResponseRole,
        judge: ProviderResponse,
    ) -> Self {
        let failure = (!judge.is_success()).then(|| OrchestrationError::JudgeFailure {
            provider: judge.provider(),
            message: judge.error().unwrap_or("unknown error").to_string(),
        });
        let final_text = judge.content().to_string();
        responses.insert(role, judge);

        Self {
            final_text,
            responses,
            failure,
        }
    }

    fn single(role: ResponseRole, response: ProviderResponse) -> Self {
        Self::judged(BTreeMap::new(), role, response)
    }
}

/// Multi-provider orchestration engine.
///
/// Configuration is fixed at construction; one instance can serve many
/// concurrent `process` calls.
pub struct Orchestrator {
    resolver: CredentialResolver,
    costs: CostTable,
    style_preference: Vec<ProviderIdentity>,
    factory: Arc<dyn ProviderFactory>,
    observer: Option<Arc<dyn CallObserver>>,
}

impl Orchestrator {
    /// Build an engine talking to the real provider APIs.
    pub fn from_config(config: &EngineConfig) -> Result<Self, RuntimeError> {
        let factory = HttpProviderFactory::from_config(config)?;
        OrchestratorBuilder::new()
            .config(config)
            .factory(Arc::new(factory))
            .build()
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn costs(&self) -> &CostTable {
        &self.costs
    }

    /// Run one prompt through `mode` for this user.
    pub async fn process(
        &self,
        prompt: &str,
        ctx: &UserContext,
        mode: Mode,
        options: &ProcessOptions,
    ) -> OrchestrationResult {
        let started = Instant::now();
        tracing::info!(user_id = %ctx.user_id, mode = %mode, "Processing request");

        let outcome = AssertUnwindSafe(self.run_mode(prompt, ctx, mode, options))
            .catch_unwind()
            .await;
        let total_duration_ms = elapsed_ms(started);

        let run = match outcome {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                tracing::error!(user_id = %ctx.user_id, mode = %mode, error = %e, "Orchestration aborted");
                return OrchestrationResult::aborted(mode, e.to_string(), total_duration_ms);
            }
            Err(panic) => {
                let e = OrchestrationError::Internal(panic_message(&*panic));
                tracing::error!(user_id = %ctx.user_id, mode = %mode, error = %e, "Orchestration panicked");
                return OrchestrationResult::aborted(mode, e.to_string(), total_duration_ms);
            }
        };

        let credits = calculate_credits(&self.costs, mode, run.responses.values());
        let error = run.failure.map(|e| e.to_string());
        match &error {
            Some(e) => tracing::warn!(user_id = %ctx.user_id, mode = %mode, error = %e, credits, "Orchestration failed"),
            None => tracing::info!(
                user_id = %ctx.user_id,
                mode = %mode,
                credits,
                duration_ms = total_duration_ms,
                "Orchestration complete"
            ),
        }

        OrchestrationResult::completed(
            mode,
            run.final_text,
            run.responses,
            total_duration_ms,
            credits,
            error,
        )
    }

    /// Probe every provider this user can reach.
    pub async fn health(&self, ctx: &UserContext) -> BTreeMap<ProviderIdentity, bool> {
        let mut status = BTreeMap::new();
        for identity in ProviderIdentity::ALL {
            let Some(provider) = self.provider_for(identity, ctx) else {
                continue;
            };
            let healthy = AssertUnwindSafe(provider.health_check())
                .catch_unwind()
                .await
                .unwrap_or(false);
            status.insert(identity, healthy);
        }
        status
    }

    async fn run_mode(
        &self,
        prompt: &str,
        ctx: &UserContext,
        mode: Mode,
        options: &ProcessOptions,
    ) -> Result<ModeOutcome, OrchestrationError> {
        match mode {
            Mode::Fast => self.run_fast(prompt, ctx).await,
            Mode::Consensus => self.run_consensus(prompt, ctx).await,
            Mode::Creative => self.run_creative(prompt, ctx, options).await,
        }
    }

    async fn run_fast(&self, prompt: &str, ctx: &UserContext) -> Result<ModeOutcome, OrchestrationError> {
        let judge = self.require(ProviderIdentity::JUDGE, ctx)?;

        let request = GenerationRequest::new(prompt)
            .with_system_prompt(build_system_prompt(ctx, PromptRole::General))
            .with_max_tokens(FAST_MAX_TOKENS)
            .with_temperature(FAST_TEMPERATURE);

        let response = self.call(ResponseRole::Primary, judge.as_ref(), &request).await;
        Ok(ModeOutcome::single(ResponseRole::Primary, response))
    }

    async fn run_consensus(
        &self,
        prompt: &str,
        ctx: &UserContext,
    ) -> Result<ModeOutcome, OrchestrationError> {
        let judge = self.require(ProviderIdentity::JUDGE, ctx)?;
        let fact_checker = self.provider_for(ProviderIdentity::FACT_CHECKER, ctx);
        let style_analyst = self
            .style_preference
            .iter()
            .find_map(|identity| self.provider_for(*identity, ctx));

        let fact_request = GenerationRequest::new(fact_check_request(prompt))
            .with_system_prompt(build_system_prompt(ctx, PromptRole::FactChecker))
            .with_max_tokens(CONSENSUS_MAX_TOKENS)
            .with_temperature(FACT_CHECK_TEMPERATURE);
        let style_request = GenerationRequest::new(style_analysis_request(prompt))
            .with_system_prompt(build_system_prompt(ctx, PromptRole::StyleAnalyzer))
            .with_max_tokens(CONSENSUS_MAX_TOKENS)
            .with_temperature(STYLE_TEMPERATURE);

        // Fan-out
        let (fact_check, style_analysis) = tokio::join!(
            self.run_branch(
                ResponseRole::FactCheck,
                ProviderIdentity::FACT_CHECKER,
                fact_checker,
                &fact_request,
            ),
            self.run_branch(
                ResponseRole::StyleAnalysis,
                self.style_placeholder_identity(),
                style_analyst,
                &style_request,
            ),
        );

        // Fan-in
        let judge_request = GenerationRequest::new(build_judge_prompt(
            prompt,
            fact_check.successful_content(),
            style_analysis.successful_content(),
        ))
        .with_system_prompt(build_system_prompt(ctx, PromptRole::Judge))
        .with_max_tokens(CONSENSUS_MAX_TOKENS)
        .with_temperature(JUDGE_TEMPERATURE);

        let verdict = self.call(ResponseRole::Judge, judge.as_ref(), &judge_request).await;

        let mut responses = BTreeMap::new();
        responses.insert(ResponseRole::FactCheck, fact_check);
        responses.insert(ResponseRole::StyleAnalysis, style_analysis);
        Ok(ModeOutcome::judged(responses, ResponseRole::Judge, verdict))
    }

    async fn run_creative(
        &self,
        topic: &str,
        ctx: &UserContext,
        options: &ProcessOptions,
    ) -> Result<ModeOutcome, OrchestrationError> {
        let judge = self.require(ProviderIdentity::JUDGE, ctx)?;
        let content_type = ContentType::from_label(options.content_type.as_deref());
        tracing::debug!(content_type = ?content_type, "Creative template selected");

        let request = GenerationRequest::new(content_type.render(topic))
            .with_system_prompt(build_system_prompt(ctx, PromptRole::Creative))
            .with_max_tokens(CREATIVE_MAX_TOKENS)
            .with_temperature(CREATIVE_TEMPERATURE);

        let response = self.call(ResponseRole::Primary, judge.as_ref(), &request).await;
        Ok(ModeOutcome::single(ResponseRole::Primary, response))
    }

    /// One consensus branch. Never fails: an unresolved provider or a panic
    /// becomes a failed response for `role`.
    async fn run_branch(
        &self,
        role: ResponseRole,
        placeholder: ProviderIdentity,
        provider: Option<Arc<dyn LlmProvider>>,
        request: &GenerationRequest,
    ) -> ProviderResponse {
        let Some(provider) = provider else {
            return ProviderResponse::failure(
                placeholder,
                format!("{} provider unavailable", role.as_str()),
                0,
            );
        };

        let identity = provider.identity();
        let started = Instant::now();
        match AssertUnwindSafe(self.call(role, provider.as_ref(), request))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(provider = %identity, role = %role.as_str(), error = %message, "Branch panicked");
                ProviderResponse::failure(identity, message, elapsed_ms(started))
            }
        }
    }

    async fn call(
        &self,
        role: ResponseRole,
        provider: &dyn LlmProvider,
        request: &GenerationRequest,
    ) -> ProviderResponse {
        let identity = provider.identity();
        if let Some(observer) = &self.observer {
            observer.call_started(identity, role);
        }

        let response = provider.generate(request).await;

        if let Some(observer) = &self.observer {
            observer.call_completed(identity, role, &response);
        }
        response
    }

    pub(crate) fn provider_for(
        &self,
        identity: ProviderIdentity,
        ctx: &UserContext,
    ) -> Option<Arc<dyn LlmProvider>> {
        self.resolver
            .resolve(identity, ctx)
            .map(|credential| self.factory.create(credential))
    }

    fn require(
        &self,
        identity: ProviderIdentity,
        ctx: &UserContext,
    ) -> Result<Arc<dyn LlmProvider>, OrchestrationError> {
        self.provider_for(identity, ctx)
            .ok_or(OrchestrationError::ProviderUnavailable(identity))
    }

    fn style_placeholder_identity(&self) -> ProviderIdentity {
        self.style_preference
            .last()
            .copied()
            .unwrap_or(ProviderIdentity::OpenAi)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    resolver: CredentialResolver,
    costs: CostTable,
    style_preference: Vec<ProviderIdentity>,
    factory: Option<Arc<dyn ProviderFactory>>,
    observer: Option<Arc<dyn CallObserver>>,
}

impl OrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            resolver: CredentialResolver::new(),
            costs: CostTable::default(),
            style_preference: vec![ProviderIdentity::Anthropic, ProviderIdentity::OpenAi],
            factory: None,
            observer: None,
        }
    }

    /// Take system keys, costs and style order from `config`.
    pub fn config(self, config: &EngineConfig) -> Self {
        self.resolver(CredentialResolver::from_keys(&config.system_keys))
            .costs(config.costs.clone())
            .style_preference(config.style_preference.clone())
    }

    pub fn resolver(mut self, resolver: CredentialResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn costs(mut self, costs: CostTable) -> Self {
        self.costs = costs;
        self
    }

    pub fn style_preference(mut self, order: Vec<ProviderIdentity>) -> Self {
        self.style_preference = order;
        self
    }

    pub fn factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator, RuntimeError> {
        let factory = self
            .factory
            .ok_or_else(|| RuntimeError::ProviderNotConfigured("No provider factory set".to_string()))?;

        if let Some(identity) = self.style_preference.iter().find(|p| !p.is_style_capable()) {
            return Err(ConfigError::Invalid(format!(
                "{} cannot perform style analysis",
                identity
            ))
            .into());
        }

        Ok(Orchestrator {
            resolver: self.resolver,
            costs: self.costs,
            style_preference: self.style_preference,
            factory,
            observer: self.observer,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{CallEvent, ChannelObserver};
    use crate::testing::{Script, ScriptedFactory};
    use council_core::prompts::{BASE_SYSTEM_PROMPT, JUDGE_INSTRUCTIONS, NOT_AVAILABLE};

    fn build_engine(factory: &ScriptedFactory, resolver: CredentialResolver) -> Orchestrator {
        Orchestrator::builder()
            .resolver(resolver)
            .factory(Arc::new(factory.clone()))
            .build()
            .unwrap()
    }

    fn system_keys(providers: &[ProviderIdentity]) -> CredentialResolver {
        providers
            .iter()
            .fold(CredentialResolver::new(), |resolver, p| {
                resolver.with_system_key(*p, format!("sys-{}", p))
            })
    }

    fn all_system_keys() -> CredentialResolver {
        system_keys(&ProviderIdentity::ALL)
    }

    #[tokio::test]
    async fn test_fast_single_primary_response() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::DeepSeek, Script::reply("pong", 5));
        let engine = build_engine(&factory, system_keys(&[ProviderIdentity::DeepSeek]));

        let result = engine
            .process("ping", &UserContext::new("u1"), Mode::Fast, &ProcessOptions::new())
            .await;

        assert!(result.is_success());
        assert_eq!(result.final_text(), "pong");
        assert_eq!(result.responses().len(), 1);
        assert!(result.response(ResponseRole::Primary).is_some());
        assert_eq!(result.total_tokens(), 5);
        assert_eq!(result.credits_consumed(), 2);

        let calls = factory.calls_to(ProviderIdentity::DeepSeek);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "ping");
        assert_eq!(calls[0].max_tokens, FAST_MAX_TOKENS);
        assert_eq!(calls[0].temperature, FAST_TEMPERATURE);
        let system = calls[0].system_prompt.as_deref().unwrap();
        assert!(system.starts_with(BASE_SYSTEM_PROMPT));
        assert!(!system.contains(JUDGE_INSTRUCTIONS));
    }

    #[tokio::test]
    async fn test_fast_without_judge_aborts() {
        let factory = ScriptedFactory::new();
        let engine = build_engine(&factory, system_keys(&[ProviderIdentity::OpenAi]));

        let result = engine
            .process("ping", &UserContext::new("u1"), Mode::Fast, &ProcessOptions::new())
            .await;

        assert!(!result.is_success());
        assert_eq!(result.error(), Some("Required provider unavailable: deepseek"));
        assert!(result.responses().is_empty());
        assert_eq!(result.credits_consumed(), 0);
        assert!(factory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fast_judge_failure_fails_run() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::DeepSeek, Script::fail("API error: 500 - down"));
        let engine = build_engine(&factory, all_system_keys());

        let result = engine
            .process("ping", &UserContext::new("u1"), Mode::Fast, &ProcessOptions::new())
            .await;

        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("API error: 500 - down"));
        assert_eq!(result.responses().len(), 1);
    }

    #[tokio::test]
    async fn test_consensus_user_owned_fact_check_and_missing_style() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::Perplexity, Script::reply("Verified facts", 30))
            .with_script(ProviderIdentity::DeepSeek, Script::reply("Final answer", 50));
        let engine = build_engine(&factory, system_keys(&[ProviderIdentity::DeepSeek]));
        let ctx = UserContext::new("u1").with_api_key(ProviderIdentity::Perplexity, "user-pplx");

        let result = engine
            .process("Is coffee healthy?", &ctx, Mode::Consensus, &ProcessOptions::new())
            .await;

        assert!(result.is_success());
        assert_eq!(result.final_text(), "Final answer");
        assert_eq!(result.responses().len(), 3);

        let fact_check = result.response(ResponseRole::FactCheck).unwrap();
        assert!(fact_check.is_success());
        assert!(fact_check.is_user_owned());

        let style = result.response(ResponseRole::StyleAnalysis).unwrap();
        assert!(!style.is_success());
        assert_eq!(style.provider(), ProviderIdentity::OpenAi);
        assert_eq!(style.tokens_used(), 0);
        assert_eq!(style.content(), "");
        assert!(style.error().unwrap().contains("unavailable"));

        assert_eq!(result.total_tokens(), 80);
        // consensus base 10, 25% off, floored
        assert_eq!(result.credits_consumed(), 7);

        let judge_calls = factory.calls_to(ProviderIdentity::DeepSeek);
        assert_eq!(judge_calls.len(), 1);
        assert!(judge_calls[0].prompt.contains("Is coffee healthy?"));
        assert!(judge_calls[0].prompt.contains("Verified facts"));
        assert!(judge_calls[0].prompt.contains(NOT_AVAILABLE));
        assert_eq!(judge_calls[0].temperature, JUDGE_TEMPERATURE);

        let fact_calls = factory.calls_to(ProviderIdentity::Perplexity);
        assert!(fact_calls[0].prompt.starts_with("Verify the facts"));
        assert_eq!(fact_calls[0].temperature, FACT_CHECK_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_consensus_with_no_specialists_still_judges() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::DeepSeek, Script::reply("Judged alone", 12));
        let engine = build_engine(&factory, system_keys(&[ProviderIdentity::DeepSeek]));

        let result = engine
            .process("topic", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;

        assert!(result.is_success());
        assert_eq!(result.responses().len(), 3);
        assert_eq!(result.total_tokens(), 12);
        assert_eq!(result.credits_consumed(), 10);

        let judge_prompt = &factory.calls_to(ProviderIdentity::DeepSeek)[0].prompt;
        assert_eq!(judge_prompt.matches(NOT_AVAILABLE).count(), 2);
        assert_eq!(factory.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_consensus_judge_failure_keeps_specialists() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::Perplexity, Script::reply("facts", 10))
            .with_script(ProviderIdentity::Anthropic, Script::reply("style", 20))
            .with_script(ProviderIdentity::DeepSeek, Script::fail("Timeout after 60s"));
        let engine = build_engine(&factory, all_system_keys());

        let result = engine
            .process("topic", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;

        assert!(!result.is_success());
        assert_eq!(result.final_text(), "");
        assert!(result.error().unwrap().contains("Timeout after 60s"));
        assert_eq!(result.responses().len(), 3);
        assert!(result.response(ResponseRole::FactCheck).unwrap().is_success());
        assert!(result.response(ResponseRole::StyleAnalysis).unwrap().is_success());
        assert_eq!(result.total_tokens(), 30);
        assert_eq!(result.credits_consumed(), 10);
    }

    #[tokio::test]
    async fn test_consensus_without_judge_makes_no_calls() {
        let factory = ScriptedFactory::new();
        let engine = build_engine(
            &factory,
            system_keys(&[ProviderIdentity::Perplexity, ProviderIdentity::Anthropic]),
        );

        let result = engine
            .process("topic", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;

        assert!(!result.is_success());
        assert!(result.responses().is_empty());
        assert!(factory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_consensus_branch_panic_becomes_failed_response() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::Anthropic, Script::panic("style exploded"))
            .with_script(ProviderIdentity::Perplexity, Script::reply("facts", 10))
            .with_script(ProviderIdentity::DeepSeek, Script::reply("final", 10));
        let engine = build_engine(&factory, all_system_keys());

        let result = engine
            .process("topic", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;

        assert!(result.is_success());
        let style = result.response(ResponseRole::StyleAnalysis).unwrap();
        assert!(!style.is_success());
        assert_eq!(style.provider(), ProviderIdentity::Anthropic);
        assert!(style.error().unwrap().contains("style exploded"));
    }

    #[tokio::test]
    async fn test_panicking_judge_aborts_with_internal_error() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::DeepSeek, Script::panic("judge exploded"));
        let engine = build_engine(&factory, all_system_keys());

        let result = engine
            .process("topic", &UserContext::new("u1"), Mode::Fast, &ProcessOptions::new())
            .await;

        assert!(!result.is_success());
        assert_eq!(result.error(), Some("Internal error: judge exploded"));
        assert_eq!(result.credits_consumed(), 0);
    }

    #[tokio::test]
    async fn test_style_preference_order() {
        let factory = ScriptedFactory::new();
        let engine = build_engine(&factory, all_system_keys());
        engine
            .process("topic", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;
        assert_eq!(factory.calls_to(ProviderIdentity::Anthropic).len(), 1);
        assert!(factory.calls_to(ProviderIdentity::OpenAi).is_empty());

        let factory = ScriptedFactory::new();
        let engine = build_engine(
            &factory,
            system_keys(&[ProviderIdentity::DeepSeek, ProviderIdentity::OpenAi]),
        );
        let result = engine
            .process("topic", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;
        assert_eq!(factory.calls_to(ProviderIdentity::OpenAi).len(), 1);
        assert_eq!(
            result.response(ResponseRole::StyleAnalysis).unwrap().provider(),
            ProviderIdentity::OpenAi
        );
    }

    #[tokio::test]
    async fn test_custom_style_preference() {
        let factory = ScriptedFactory::new();
        let engine = Orchestrator::builder()
            .resolver(all_system_keys())
            .style_preference(vec![ProviderIdentity::OpenAi, ProviderIdentity::Anthropic])
            .factory(Arc::new(factory.clone()))
            .build()
            .unwrap();

        engine
            .process("topic", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;
        assert_eq!(factory.calls_to(ProviderIdentity::OpenAi).len(), 1);
        assert!(factory.calls_to(ProviderIdentity::Anthropic).is_empty());
    }

    #[tokio::test]
    async fn test_creative_without_judge_aborts() {
        let factory = ScriptedFactory::new();
        let engine = build_engine(
            &factory,
            system_keys(&[ProviderIdentity::Perplexity, ProviderIdentity::OpenAi]),
        );

        let options = ProcessOptions::new().with_content_type("thread");
        let result = engine
            .process("remote work", &UserContext::new("u1"), Mode::Creative, &options)
            .await;

        assert!(!result.is_success());
        assert_eq!(result.error(), Some("Required provider unavailable: deepseek"));
        assert!(result.responses().is_empty());
        assert_eq!(result.credits_consumed(), 0);
        assert!(factory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_creative_unknown_content_type_uses_reel() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::DeepSeek, Script::reply("script", 40));
        let engine = build_engine(&factory, system_keys(&[ProviderIdentity::DeepSeek]));

        let result = engine
            .process(
                "homemade bread",
                &UserContext::new("u1"),
                Mode::Creative,
                &ProcessOptions::new().with_content_type("foobar"),
            )
            .await;

        assert!(result.is_success());
        assert_eq!(result.credits_consumed(), 8);

        let request = &factory.calls_to(ProviderIdentity::DeepSeek)[0];
        assert!(request.prompt.contains("REEL SCRIPT"));
        assert!(request.prompt.contains("TOPIC: homemade bread"));
        assert!(!request.prompt.contains("foobar"));
        assert!(!request.prompt.contains("{topic}"));
        assert_eq!(request.max_tokens, CREATIVE_MAX_TOKENS);
        assert_eq!(request.temperature, CREATIVE_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_creative_thread_template() {
        let factory = ScriptedFactory::new();
        let engine = build_engine(&factory, system_keys(&[ProviderIdentity::DeepSeek]));

        engine
            .process(
                "remote work",
                &UserContext::new("u1"),
                Mode::Creative,
                &ProcessOptions::new().with_content_type("thread"),
            )
            .await;

        let request = &factory.calls_to(ProviderIdentity::DeepSeek)[0];
        assert!(request.prompt.contains("TWITTER THREAD"));
        assert!(request.prompt.contains("TOPIC: remote work"));
    }

    #[tokio::test]
    async fn test_user_owned_judge_discount_in_fast_mode() {
        let factory = ScriptedFactory::new();
        let engine = build_engine(&factory, CredentialResolver::new());
        let ctx = UserContext::new("u1").with_api_key(ProviderIdentity::DeepSeek, "user-ds");

        let result = engine.process("hi", &ctx, Mode::Fast, &ProcessOptions::new()).await;

        assert!(result.response(ResponseRole::Primary).unwrap().is_user_owned());
        // base 2, 25% off => 1.5 floored to 1
        assert_eq!(result.credits_consumed(), 1);
    }

    #[tokio::test]
    async fn test_total_tokens_sum_every_response() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::Perplexity, Script::reply("a", 7))
            .with_script(ProviderIdentity::Anthropic, Script::fail("down"))
            .with_script(ProviderIdentity::DeepSeek, Script::reply("c", 11));
        let engine = build_engine(&factory, all_system_keys());

        let result = engine
            .process("x", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;

        let summed: u64 = result
            .responses()
            .values()
            .map(|r| u64::from(r.tokens_used()))
            .sum();
        assert_eq!(result.total_tokens(), summed);
        assert_eq!(result.total_tokens(), 18);
    }

    #[tokio::test]
    async fn test_observer_sees_every_call() {
        let (observer, mut events) = ChannelObserver::channel();
        let factory = ScriptedFactory::new();
        let engine = Orchestrator::builder()
            .resolver(all_system_keys())
            .factory(Arc::new(factory.clone()))
            .observer(Arc::new(observer))
            .build()
            .unwrap();

        engine
            .process("x", &UserContext::new("u1"), Mode::Consensus, &ProcessOptions::new())
            .await;

        let mut started = Vec::new();
        let mut completed = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                CallEvent::Started { provider, role } => started.push((provider, role)),
                CallEvent::Completed { .. } => completed += 1,
            }
        }
        assert_eq!(started.len(), 3);
        assert_eq!(completed, 3);
        assert!(started.contains(&(ProviderIdentity::Perplexity, ResponseRole::FactCheck)));
        assert!(started.contains(&(ProviderIdentity::Anthropic, ResponseRole::StyleAnalysis)));
        // The judge always starts last
        assert_eq!(started[2], (ProviderIdentity::DeepSeek, ResponseRole::Judge));
    }

    #[tokio::test]
    async fn test_shared_engine_serves_concurrent_calls() {
        let factory = ScriptedFactory::new();
        let engine = Arc::new(build_engine(&factory, all_system_keys()));
        let ctx_a = UserContext::new("a");
        let ctx_b = UserContext::new("b");
        let options = ProcessOptions::new();

        let (a, b) = tokio::join!(
            engine.process("one", &ctx_a, Mode::Fast, &options),
            engine.process("two", &ctx_b, Mode::Creative, &options),
        );
        assert!(a.is_success() && b.is_success());
        assert_eq!(factory.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_health_covers_resolvable_providers_only() {
        let factory = ScriptedFactory::new()
            .with_script(ProviderIdentity::OpenAi, Script::fail("invalid key"));
        let engine = build_engine(
            &factory,
            system_keys(&[ProviderIdentity::DeepSeek, ProviderIdentity::OpenAi]),
        );

        let status = engine.health(&UserContext::new("u1")).await;

        assert_eq!(status.len(), 2);
        assert_eq!(status[&ProviderIdentity::DeepSeek], true);
        assert_eq!(status[&ProviderIdentity::OpenAi], false);
        assert!(factory
            .calls()
            .iter()
            .all(|call| call.request.max_tokens == crate::providers::HEALTH_CHECK_MAX_TOKENS));
    }

    #[test]
    fn test_builder_requires_factory() {
        assert!(matches!(
            OrchestratorBuilder::new().build(),
            Err(RuntimeError::ProviderNotConfigured(_))
        ));
    }

    #[test]
    fn test_builder_rejects_non_style_provider() {
        let result = Orchestrator::builder()
            .factory(Arc::new(ScriptedFactory::new()))
            .style_preference(vec![ProviderIdentity::Perplexity])
            .build();
        assert!(matches!(result, Err(RuntimeError::Config(ConfigError::Invalid(_)))));
    }
}
