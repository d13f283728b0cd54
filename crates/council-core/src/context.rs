//! Per-request user context supplied by the host application.
//!
//! The orchestrator only reads this value. It is built by the host from its
//! own user records and is never persisted here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::preference::PreferenceRecord;
use crate::types::ProviderIdentity;

/// User's identity and voice, injected into every system prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingProfile {
    /// Free-form self description. The identity block is only rendered
    /// when this is non-empty.
    #[serde(default)]
    pub personal_description: Option<String>,

    #[serde(default)]
    pub preferred_tone: Option<String>,

    #[serde(default)]
    pub values: Vec<String>,

    #[serde(default)]
    pub main_topics: Vec<String>,

    #[serde(default)]
    pub writing_style: Option<String>,

    #[serde(default)]
    pub audience: Option<String>,

    #[serde(default)]
    pub fixed_hashtags: Vec<String>,
}

impl TrainingProfile {
    /// The personal description, if present and not blank.
    pub fn description(&self) -> Option<&str> {
        self.personal_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Subscription plan of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Starter,
    Pro,
    Enterprise,
}

/// Limits attached to a plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub monthly_credits: u32,
    pub consensus_enabled: bool,
    pub byoa_enabled: bool,
}

impl PlanTier {
    pub fn limits(&self) -> PlanLimits {
        match self {
            PlanTier::Free => PlanLimits {
                monthly_credits: 50,
                consensus_enabled: false,
                byoa_enabled: false,
            },
            PlanTier::Starter => PlanLimits {
                monthly_credits: 500,
                consensus_enabled: true,
                byoa_enabled: true,
            },
            PlanTier::Pro => PlanLimits {
                monthly_credits: 2000,
                consensus_enabled: true,
                byoa_enabled: true,
            },
            PlanTier::Enterprise => PlanLimits {
                monthly_credits: 10_000,
                consensus_enabled: true,
                byoa_enabled: true,
            },
        }
    }
}

/// Everything the orchestrator knows about the requesting user.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,

    /// External messaging identity (e.g. a chat platform user id).
    #[serde(default)]
    pub external_id: Option<i64>,

    #[serde(default)]
    pub profile: TrainingProfile,

    /// Previously learned preferences, oldest first.
    #[serde(default)]
    pub preferences: Vec<PreferenceRecord>,

    #[serde(default)]
    pub plan: PlanTier,

    #[serde(default)]
    pub credit_balance: u32,

    /// User-owned API keys (BYOA). Never logged or serialized.
    #[serde(default, skip_serializing)]
    pub api_keys: BTreeMap<ProviderIdentity, String>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_profile(mut self, profile: TrainingProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_preference(mut self, preference: PreferenceRecord) -> Self {
        self.preferences.push(preference);
        self
    }

    pub fn with_api_key(mut self, provider: ProviderIdentity, key: impl Into<String>) -> Self {
        self.api_keys.insert(provider, key.into());
        self
    }

    pub fn with_plan(mut self, plan: PlanTier) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_credit_balance(mut self, credits: u32) -> Self {
        self.credit_balance = credits;
        self
    }

    /// User-owned key for a provider, ignoring blank entries.
    pub fn api_key(&self, provider: ProviderIdentity) -> Option<&str> {
        self.api_keys
            .get(&provider)
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    /// Whether the balance covers a charge.
    pub fn can_afford(&self, credits: u32) -> bool {
        self.credit_balance >= credits
    }
}

impl fmt::Debug for UserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserContext")
            .field("user_id", &self.user_id)
            .field("external_id", &self.external_id)
            .field("profile", &self.profile)
            .field("preferences", &self.preferences)
            .field("plan", &self.plan)
            .field("credit_balance", &self.credit_balance)
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
