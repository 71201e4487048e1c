//! Alert delivery.
//!
//! Defines the `Notifier` trait and provides implementations for:
//! - Discord (bot REST API) — the operator's chat channel
//! - Log-only fallback when no channel is configured or reachable
//!
//! Notification is best-effort: implementations swallow and log their own
//! delivery failures, so `notify` never fails from the caller's view.

pub mod discord;

use async_trait::async_trait;
use tracing::info;

/// Abstraction over human-facing status channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message. Never fails; delivery errors are logged locally.
    async fn notify(&self, message: &str);
}

/// Writes alerts to the local log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        info!(channel = "log", "{message}");
    }
}
