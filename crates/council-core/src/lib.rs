//! # council-core
//!
//! Deterministic building blocks for the council orchestrator.
//!
//! This crate answers, without touching the network:
//! - What does each provider get told? ([`prompts`])
//! - How much should a run cost? ([`cost`])
//! - What did the user's feedback teach us? ([`preference`])
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No provider calls**: All I/O lives in `council-runtime`
//! 3. **Failures are data**: provider failures are values, not errors
//!
//! ## Example
//!
//! ```rust
//! use council_core::{build_system_prompt, PromptRole, UserContext};
//!
//! let ctx = UserContext::new("user-123");
//! let prompt = build_system_prompt(&ctx, PromptRole::Judge);
//! assert!(prompt.contains("FINAL JUDGE"));
//! ```

pub mod context;
pub mod cost;
pub mod preference;
pub mod prompts;
pub mod types;

// Re-export main types at crate root
pub use context::{PlanLimits, PlanTier, TrainingProfile, UserContext};
pub use cost::{calculate_credits, discount_percent, CostTable, DEFAULT_BASE_COST};
pub use preference::{
    extract_preference, parse_preference, ExtractionError, PreferenceKind, PreferenceRecord,
};
pub use prompts::{
    build_judge_prompt, build_system_prompt, build_system_prompt_for_label, ContentType,
    PromptRole,
};
pub use types::{
    Mode, OrchestrationResult, ParseLabelError, ProcessOptions, ProviderIdentity,
    ProviderResponse, ResponseRole,
};

use thiserror::Error;

/// Errors that abort an orchestration run.
///
/// These never escape `process`; they are rendered into the error string of
/// a failed [`OrchestrationResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("Required provider unavailable: {0}")]
    ProviderUnavailable(ProviderIdentity),

    #[error("Judge call failed ({provider}): {message}")]
    JudgeFailure {
        provider: ProviderIdentity,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
