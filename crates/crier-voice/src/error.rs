use thiserror::Error;

/// Errors surfaced by the session manager contract.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Submitted text was empty (or whitespace only). Never enqueued.
    #[error("text is empty")]
    EmptyText,

    /// Submitted text exceeded the configured maximum. Never enqueued.
    #[error("text too long: {len} characters (limit: {max})")]
    TextTooLong { len: usize, max: usize },

    /// Submit on a channel with no live session and auto-join disabled.
    #[error("no active voice session for channel {0}")]
    NoActiveSession(String),

    /// The voice transport could not be opened; the session was not created.
    #[error("voice transport unavailable for channel {channel_id}: {reason}")]
    TransportUnavailable { channel_id: String, reason: String },

    /// The queue store could not be written. The originating submit fails
    /// rather than accepting a request without durability.
    #[error("queue store unavailable: {0}")]
    StoreUnavailable(String),

    /// The session closed while a submit was in progress.
    #[error("voice session for channel {0} closed during submit")]
    SessionClosed(String),
}
