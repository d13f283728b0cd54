//! Preference learning from user feedback.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use council_core::prompts::build_extraction_prompt;
use council_core::{extract_preference, PreferenceRecord, ProviderIdentity, UserContext};

use crate::orchestrator::{panic_message, Orchestrator};
use crate::providers::GenerationRequest;

pub const LEARN_MAX_TOKENS: u32 = 200;
pub const LEARN_TEMPERATURE: f32 = 0.3;

impl Orchestrator {
    /// Ask the judge to turn feedback into one preference record.
    ///
    /// Best effort: returns `None` when the judge is unavailable, the call
    /// fails, or the reply holds no parseable object. Storing the record is
    /// up to the caller.
    pub async fn learn(
        &self,
        ctx: &UserContext,
        feedback: &str,
        original_response: &str,
    ) -> Option<PreferenceRecord> {
        let judge = self.provider_for(ProviderIdentity::JUDGE, ctx)?;

        let request = GenerationRequest::new(build_extraction_prompt(feedback, original_response))
            .with_max_tokens(LEARN_MAX_TOKENS)
            .with_temperature(LEARN_TEMPERATURE);

        let response = match AssertUnwindSafe(judge.generate(&request)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                tracing::error!(user_id = %ctx.user_id, error = %panic_message(&*panic), "Preference extraction panicked");
                return None;
            }
        };

        if !response.is_success() {
            tracing::warn!(
                user_id = %ctx.user_id,
                error = response.error().unwrap_or_default(),
                "Preference extraction call failed"
            );
            return None;
        }

        let record = extract_preference(response.content());
        if let Some(record) = &record {
            tracing::info!(user_id = %ctx.user_id, key = %record.key, kind = ?record.kind, "Learned preference");
        }
        record
    }
}
