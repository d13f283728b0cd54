//! Shared data model for orchestration requests and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A label that did not match any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

impl ParseLabelError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The closed set of remote text-generation services.
///
/// Each identity has a fixed role in the council:
/// - `DeepSeek` is the judge and produces the final text in every mode
/// - `Perplexity` is the fact checker
/// - `Anthropic` and `OpenAi` are the two alternative style analysts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderIdentity {
    DeepSeek,
    Perplexity,
    Anthropic,
    OpenAi,
}

impl ProviderIdentity {
    /// Every provider, in a stable order.
    pub const ALL: [ProviderIdentity; 4] = [
        ProviderIdentity::DeepSeek,
        ProviderIdentity::Perplexity,
        ProviderIdentity::Anthropic,
        ProviderIdentity::OpenAi,
    ];

    /// The provider that judges and produces final answers.
    pub const JUDGE: ProviderIdentity = ProviderIdentity::DeepSeek;

    /// The provider used for fact checking in consensus mode.
    pub const FACT_CHECKER: ProviderIdentity = ProviderIdentity::Perplexity;

    /// Lowercase tag used in configuration and user key maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderIdentity::DeepSeek => "deepseek",
            ProviderIdentity::Perplexity => "perplexity",
            ProviderIdentity::Anthropic => "anthropic",
            ProviderIdentity::OpenAi => "openai",
        }
    }

    /// Whether this provider may serve the style-analysis role.
    pub fn is_style_capable(&self) -> bool {
        matches!(self, ProviderIdentity::Anthropic | ProviderIdentity::OpenAi)
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderIdentity {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderIdentity::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLabelError::new("provider", s))
    }
}

/// Orchestration strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single judge call.
    Fast,
    /// Fact check + style analysis in parallel, then judge synthesis.
    Consensus,
    /// Template-driven content generation by the judge.
    Creative,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Consensus => "consensus",
            Mode::Creative => "creative",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "consensus" => Ok(Mode::Consensus),
            "creative" => Ok(Mode::Creative),
            _ => Err(ParseLabelError::new("mode", s)),
        }
    }
}

/// Slot a response occupies in an [`OrchestrationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseRole {
    /// The single call made by FAST and CREATIVE.
    Primary,
    FactCheck,
    StyleAnalysis,
    Judge,
}

impl ResponseRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseRole::Primary => "primary",
            ResponseRole::FactCheck => "fact_check",
            ResponseRole::StyleAnalysis => "style_analysis",
            ResponseRole::Judge => "judge",
        }
    }
}

impl fmt::Display for ResponseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single provider call.
///
/// A failed response always has empty content and an error message; a
/// successful one never carries an error. Construct through
/// [`ProviderResponse::success`] or [`ProviderResponse::failure`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResponse {
    provider: ProviderIdentity,
    content: String,
    tokens_used: u32,
    duration_ms: u64,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    user_owned: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, JsonValue>,
}

impl ProviderResponse {
    /// A successful call.
    pub fn success(
        provider: ProviderIdentity,
        content: impl Into<String>,
        tokens_used: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            provider,
            content: content.into(),
            tokens_used,
            duration_ms,
            success: true,
            error: None,
            user_owned: false,
            metadata: BTreeMap::new(),
        }
    }

    /// A failed call. Failed calls report zero tokens.
    pub fn failure(provider: ProviderIdentity, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            provider,
            content: String::new(),
            tokens_used: 0,
            duration_ms,
            success: false,
            error: Some(error.into()),
            user_owned: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Mark whether the call ran on a user-owned credential.
    pub fn with_user_owned(mut self, user_owned: bool) -> Self {
        self.user_owned = user_owned;
        self
    }

    /// Attach provider-specific metadata (e.g. citations).
    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn provider(&self) -> ProviderIdentity {
        self.provider
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tokens_used(&self) -> u32 {
        self.tokens_used
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_user_owned(&self) -> bool {
        self.user_owned
    }

    pub fn metadata(&self) -> &BTreeMap<String, JsonValue> {
        &self.metadata
    }

    /// Content of a successful response, `None` for failures.
    pub fn successful_content(&self) -> Option<&str> {
        self.success.then_some(self.content.as_str())
    }
}

/// Caller-supplied options for a `process` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Content type for CREATIVE mode ("reel", "thread", "caption").
    #[serde(default)]
    pub content_type: Option<String>,
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Final outcome of one orchestration call.
///
/// `total_tokens` is always the exact sum of the tokens of every entry in
/// `responses`, failed placeholders included.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    final_text: String,
    mode: Mode,
    responses: BTreeMap<ResponseRole, ProviderResponse>,
    total_tokens: u64,
    total_duration_ms: u64,
    credits_consumed: u32,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    completed_at: DateTime<Utc>,
}

impl OrchestrationResult {
    /// A run that reached at least one provider call.
    ///
    /// The result is successful when `error` is `None`.
    pub fn completed(
        mode: Mode,
        final_text: impl Into<String>,
        responses: BTreeMap<ResponseRole, ProviderResponse>,
        total_duration_ms: u64,
        credits_consumed: u32,
        error: Option<String>,
    ) -> Self {
        let total_tokens = responses
            .values()
            .map(|r| u64::from(r.tokens_used()))
            .sum();

        Self {
            final_text: final_text.into(),
            mode,
            responses,
            total_tokens,
            total_duration_ms,
            credits_consumed,
            success: error.is_none(),
            error,
            completed_at: Utc::now(),
        }
    }

    /// A run aborted before producing any provider response.
    pub fn aborted(mode: Mode, error: impl Into<String>, total_duration_ms: u64) -> Self {
        Self {
            final_text: String::new(),
            mode,
            responses: BTreeMap::new(),
            total_tokens: 0,
            total_duration_ms,
            credits_consumed: 0,
            success: false,
            error: Some(error.into()),
            completed_at: Utc::now(),
        }
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn responses(&self) -> &BTreeMap<ResponseRole, ProviderResponse> {
        &self.responses
    }

    pub fn response(&self, role: ResponseRole) -> Option<&ProviderResponse> {
        self.responses.get(&role)
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn credits_consumed(&self) -> u32 {
        self.credits_consumed
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_has_empty_content_and_error() {
        let response = ProviderResponse::failure(ProviderIdentity::Perplexity, "boom", 12);
        assert!(!response.is_success());
        assert_eq!(response.content(), "");
        assert_eq!(response.error(), Some("boom"));
        assert_eq!(response.tokens_used(), 0);
        assert_eq!(response.successful_content(), None);
    }

    #[test]
    fn test_success_has_no_error() {
        let response = ProviderResponse::success(ProviderIdentity::DeepSeek, "pong", 5, 30);
        assert!(response.is_success());
        assert!(response.error().is_none());
        assert_eq!(response.successful_content(), Some("pong"));
    }

    #[test]
    fn test_total_tokens_includes_failed_entries() {
        let mut responses = BTreeMap::new();
        responses.insert(
            ResponseRole::FactCheck,
            ProviderResponse::failure(ProviderIdentity::Perplexity, "unavailable", 0),
        );
        responses.insert(
            ResponseRole::StyleAnalysis,
            ProviderResponse::success(ProviderIdentity::Anthropic, "style", 40, 10),
        );
        responses.insert(
            ResponseRole::Judge,
            ProviderResponse::success(ProviderIdentity::DeepSeek, "final", 60, 10),
        );

        let result = OrchestrationResult::completed(Mode::Consensus, "final", responses, 25, 10, None);
        assert_eq!(result.total_tokens(), 100);
        assert!(result.is_success());
        assert_eq!(result.responses().len(), 3);
    }

    #[test]
    fn test_aborted_result() {
        let result = OrchestrationResult::aborted(Mode::Fast, "required provider unavailable", 3);
        assert!(!result.is_success());
        assert_eq!(result.total_tokens(), 0);
        assert_eq!(result.credits_consumed(), 0);
        assert!(result.responses().is_empty());
    }

    #[test]
    fn test_completed_at_is_stamped() {
        let before = Utc::now();
        let result = OrchestrationResult::aborted(Mode::Fast, "x", 0);
        assert!(result.completed_at() >= before);
        assert!(result.completed_at() <= Utc::now());
    }

    #[test]
    fn test_labels_round_trip() {
        assert_eq!("consensus".parse::<Mode>().unwrap(), Mode::Consensus);
        assert_eq!("OpenAI".parse::<ProviderIdentity>().unwrap(), ProviderIdentity::OpenAi);
        assert!("turbo".parse::<Mode>().is_err());
        assert_eq!(ProviderIdentity::DeepSeek.to_string(), "deepseek");
    }

    #[test]
    fn test_serialized_keys() {
        let json = serde_json::to_value(ProviderIdentity::OpenAi).unwrap();
        assert_eq!(json, "openai");
        let json = serde_json::to_value(ResponseRole::StyleAnalysis).unwrap();
        assert_eq!(json, "style_analysis");
    }
}
