//! The speech request model.
//!
//! A `SpeechRequest` is one unit of speech work: a piece of text bound for a
//! voice channel. Requests are assigned monotonically increasing ids by the
//! store at enqueue time; within a channel, id order is playback order.

use serde::{Deserialize, Serialize};

use crate::voice::VoiceParams;

/// Lifecycle status of a speech request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Queued and waiting for playback.
    Pending,
    /// Currently being synthesized or streamed. At most one per channel.
    InFlight,
    /// Played to completion.
    Done,
    /// Synthesis exhausted its retries; the item was skipped.
    Failed,
}

impl RequestStatus {
    /// Returns the stable string form stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses the stored string form back into a status.
    ///
    /// Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One unit of speech work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Unique, monotonically increasing id assigned by the store at enqueue.
    pub id: i64,
    /// Target voice channel.
    pub channel_id: String,
    /// Originating user.
    pub requester_id: String,
    /// The text to speak.
    pub text: String,
    /// Voice selection and shaping parameters.
    pub voice_params: VoiceParams,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Enqueue timestamp (ISO 8601).
    pub enqueued_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_string_form() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::InFlight,
            RequestStatus::Done,
            RequestStatus::Failed,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("bogus"), None);
    }
}
