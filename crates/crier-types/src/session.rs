//! Session lifecycle state.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a voice session.
///
/// Published by each session through a watch channel so that the manager and
/// the command surface can observe progress without touching session
/// internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Transport connection is being established.
    Connecting,
    /// Connected, queue empty, waiting for work.
    Idle,
    /// Streaming an item to the transport.
    Playing,
    /// Leave requested; finishing the current item before closing.
    Draining,
    /// Transport released; the session is gone.
    Closed,
}

impl SessionState {
    /// Returns the stable string form used in logs and API responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}
