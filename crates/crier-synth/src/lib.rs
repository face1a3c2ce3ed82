//! Text-to-speech synthesis client.
//!
//! Wraps the external synthesis service behind the [`Synthesizer`] trait and
//! the retrying [`SynthesisClient`]. Transient failures (timeouts, rate
//! limits, server errors) are retried with exponential backoff and jitter
//! under an explicit [`RetryPolicy`]; client errors (bad voice parameters,
//! rejected text) propagate immediately without retry.

mod error;
mod http;
mod retry;

pub use error::SynthesisError;
pub use http::HttpSynthesizer;
pub use retry::RetryPolicy;

use std::sync::Arc;

use async_trait::async_trait;
use crier_types::VoiceParams;

/// A backend that turns text plus voice parameters into raw audio bytes.
///
/// Implementations must be cheap to share; the playback pumps hold one
/// instance behind an `Arc` across all channels.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes `text` into raw PCM audio.
    async fn synthesize(&self, text: &str, params: &VoiceParams)
        -> Result<Vec<u8>, SynthesisError>;
}

/// Retrying wrapper around a [`Synthesizer`] backend.
///
/// One call to [`SynthesisClient::synthesize`] makes up to
/// `policy.max_attempts` backend calls, sleeping between transient failures.
/// Non-retryable errors are returned as-is after the first attempt.
#[derive(Clone)]
pub struct SynthesisClient {
    backend: Arc<dyn Synthesizer>,
    policy: RetryPolicy,
}

impl SynthesisClient {
    pub fn new(backend: Arc<dyn Synthesizer>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Synthesizes with bounded retry.
    ///
    /// # Errors
    ///
    /// Returns the backend error directly for non-retryable failures, or
    /// `SynthesisError::Exhausted` once transient failures use up the
    /// attempt budget.
    pub async fn synthesize(
        &self,
        text: &str,
        params: &VoiceParams,
    ) -> Result<Vec<u8>, SynthesisError> {
        let mut attempt: u32 = 0;

        loop {
            match self.backend.synthesize(text, params).await {
                Ok(audio) => return Ok(audio),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        return Err(SynthesisError::Exhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient synthesis failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
