//! Secure credential handling and BYOA credential resolution.
//!
//! This module provides a centralized, type-safe way to handle API keys:
//!
//! - **No accidental logging**: Credentials cannot appear in Debug/Display output
//! - **Memory safety**: Credentials are zeroed on drop
//! - **Ownership tracking**: Every credential knows whether the user or the
//!   system owns it, which drives the cost discount
//!
//! ## Resolution order
//!
//! ```ignore
//! let resolver = CredentialResolver::new().with_system_key(ProviderIdentity::DeepSeek, "sk-...");
//!
//! // 1. user-owned key from the UserContext
//! // 2. system key from the resolver
//! // 3. None
//! let credential = resolver.resolve(ProviderIdentity::DeepSeek, &ctx);
//! ```

use council_core::{ProviderIdentity, UserContext};
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::fmt;

/// Who owns a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOwner {
    /// Supplied by the user (BYOA)
    User,
    /// Supplied by the engine configuration
    System,
}

impl fmt::Display for CredentialOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialOwner::User => write!(f, "user"),
            CredentialOwner::System => write!(f, "system"),
        }
    }
}

/// A securely-stored API credential for one provider.
///
/// Created per request and never persisted. The key is only reachable
/// through [`ApiCredential::expose`], at the point of use.
pub struct ApiCredential {
    value: SecretString,
    owner: CredentialOwner,
    provider: ProviderIdentity,
}

impl ApiCredential {
    /// Create a new credential. The value cannot be logged after this point.
    pub fn new(value: impl Into<String>, owner: CredentialOwner, provider: ProviderIdentity) -> Self {
        Self {
            value: SecretString::from(value.into()),
            owner,
            provider,
        }
    }

    /// Expose the key for an HTTP header. Never store the returned value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn owner(&self) -> CredentialOwner {
        self.owner
    }

    pub fn provider(&self) -> ProviderIdentity {
        self.provider
    }

    pub fn is_user_owned(&self) -> bool {
        self.owner == CredentialOwner::User
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("owner", &self.owner)
            .field("provider", &self.provider)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} key ({}) [REDACTED]", self.provider, self.owner)
    }
}

/// Picks, per provider, between a user-owned key and a system key.
///
/// System keys are fixed at construction and never mutated by a request.
#[derive(Default)]
pub struct CredentialResolver {
    system_keys: BTreeMap<ProviderIdentity, SecretString>,
}

impl CredentialResolver {
    /// Create a resolver with no system keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver from a provider → key map. Blank keys are skipped.
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = (&'a ProviderIdentity, &'a String)>) -> Self {
        keys.into_iter()
            .fold(Self::new(), |resolver, (provider, key)| {
                resolver.with_system_key(*provider, key.as_str())
            })
    }

    /// Add a system key.
    pub fn with_system_key(mut self, provider: ProviderIdentity, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.trim().is_empty() {
            self.system_keys.insert(provider, SecretString::from(key));
        }
        self
    }

    /// Resolve the credential for a provider. Never fails; absence is `None`.
    pub fn resolve(&self, provider: ProviderIdentity, ctx: &UserContext) -> Option<ApiCredential> {
        if let Some(key) = ctx.api_key(provider) {
            tracing::info!(provider = %provider, user_id = %ctx.user_id, "Using user-owned key");
            return Some(ApiCredential::new(key, CredentialOwner::User, provider));
        }

        if let Some(key) = self.system_keys.get(&provider) {
            tracing::info!(provider = %provider, "Using system key");
            return Some(ApiCredential::new(
                key.expose_secret(),
                CredentialOwner::System,
                provider,
            ));
        }

        tracing::warn!(provider = %provider, "No credential available");
        None
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("system_keys", &self.system_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
