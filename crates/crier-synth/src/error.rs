use thiserror::Error;

/// Errors from the synthesis service boundary.
///
/// `Timeout`, `RateLimited`, and `Transient` are eligible for retry;
/// everything else propagates to the caller immediately.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The per-call timeout elapsed. Treated as transient.
    #[error("synthesis call timed out")]
    Timeout,

    /// The service signalled rate limiting (HTTP 429).
    #[error("synthesis service rate limited the request")]
    RateLimited,

    /// Network or server-side failure expected to clear on retry.
    #[error("transient synthesis error: {0}")]
    Transient(String),

    /// The requested voice/rate/style combination was rejected.
    #[error("invalid voice parameters: {0}")]
    InvalidVoiceParams(String),

    /// The service refused the text payload (too long, unsupported content).
    #[error("text rejected by synthesis service: {0}")]
    TextRejected(String),

    /// Client misconfiguration (bad endpoint, bad credentials).
    #[error("synthesis client configuration error: {0}")]
    Config(String),

    /// The retry budget ran out on transient failures.
    #[error("synthesis failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl SynthesisError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::Transient(_)
        )
    }
}
