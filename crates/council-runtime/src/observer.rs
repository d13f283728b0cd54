//! Progress notifications for provider calls made by `process`.
//!
//! Observers are fire-and-forget: they cannot influence the run and a slow
//! or gone consumer never blocks it.

use council_core::{ProviderIdentity, ProviderResponse, ResponseRole};
use tokio::sync::mpsc;

/// Receives a notification around every provider call.
pub trait CallObserver: Send + Sync {
    fn call_started(&self, provider: ProviderIdentity, role: ResponseRole);

    fn call_completed(&self, provider: ProviderIdentity, role: ResponseRole, response: &ProviderResponse);
}

/// Event emitted by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Started {
        provider: ProviderIdentity,
        role: ResponseRole,
    },
    Completed {
        provider: ProviderIdentity,
        role: ResponseRole,
        response: ProviderResponse,
    },
}

/// Forwards call events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<CallEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CallEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn emit(&self, event: CallEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Call event dropped, receiver closed");
        }
    }
}

impl CallObserver for ChannelObserver {
    fn call_started(&self, provider: ProviderIdentity, role: ResponseRole) {
        self.emit(CallEvent::Started { provider, role });
    }

    fn call_completed(&self, provider: ProviderIdentity, role: ResponseRole, response: &ProviderResponse) {
        self.emit(CallEvent::Completed {
            provider,
            role,
            response: response.clone(),
        });
    }
}
