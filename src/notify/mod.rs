//! Operator notifications.
//!
//! Best-effort delivery of human-readable messages. A failed delivery is
//! reported through `tracing` and never reaches the caller.

pub mod discord;

use async_trait::async_trait;

pub use discord::DiscordNotifier;

/// A sink for plain-text messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message`. Must not fail or panic.
    async fn notify(&self, message: &str);

    /// Sink name for logging.
    fn name(&self) -> &str;
}

/// Used when no sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _message: &str) {}

    fn name(&self) -> &str {
        "none"
    }
}
