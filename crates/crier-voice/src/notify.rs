//! The requester notification boundary.
//!
//! When an item permanently fails, the originating user should hear about
//! it through the chat platform's messaging layer. That layer is outside
//! this crate; [`LogNotifier`] is the default used until one is wired in.

use async_trait::async_trait;

/// Delivers per-item failure reports to the originating requester.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Reports that a queued item was skipped after exhausting retries.
    async fn playback_failed(
        &self,
        channel_id: &str,
        requester_id: &str,
        request_id: i64,
        reason: &str,
    );
}

/// A notifier that only logs.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn playback_failed(
        &self,
        channel_id: &str,
        requester_id: &str,
        request_id: i64,
        reason: &str,
    ) {
        tracing::warn!(
            channel = channel_id,
            requester = requester_id,
            request_id,
            reason,
            "speech request failed"
        );
    }
}
