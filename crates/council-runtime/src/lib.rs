//! # council-runtime
//!
//! The async half of Council: credential resolution, HTTP adapters for the
//! four providers, and the orchestration engine that runs FAST, CONSENSUS
//! and CREATIVE modes on top of `council-core`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use council_core::{Mode, ProcessOptions, UserContext};
//! use council_runtime::{EngineConfig, Orchestrator};
//!
//! let config = EngineConfig::from_file("council.yaml")?.with_env_keys();
//! let engine = Orchestrator::from_config(&config)?;
//!
//! let ctx = UserContext::new("user-123");
//! let result = engine
//!     .process("Is coffee healthy?", &ctx, Mode::Consensus, &ProcessOptions::new())
//!     .await;
//! println!("{} ({} credits)", result.final_text(), result.credits_consumed());
//! ```

pub mod config;
pub mod learning;
pub mod observer;
pub mod orchestrator;
pub mod providers;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, EngineConfig, ProviderSettings};
pub use observer::{CallEvent, CallObserver, ChannelObserver};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use providers::{
    ApiCredential, CredentialOwner, CredentialResolver, GenerationRequest, HttpProviderFactory,
    LlmProvider, ProviderAdapter, ProviderError, ProviderFactory,
};

use thiserror::Error;

/// Errors from constructing the runtime.
///
/// Running a request never fails with this type; see
/// [`Orchestrator::process`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
