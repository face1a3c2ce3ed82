//! Engine tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What happens to a channel's remaining queue when the session closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeavePolicy {
    /// Leave the rows `pending` in the store so they play once the bot
    /// rejoins. The durable default.
    #[default]
    Persist,
    /// Delete the channel's remaining `pending` rows.
    Discard,
}

/// Runtime configuration for the voice session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum submitted text length in characters. Longer submissions are
    /// rejected synchronously, never enqueued.
    pub max_text_len: usize,

    /// How long a session may sit idle with an empty queue before it
    /// self-closes and releases its transport handle.
    pub idle_timeout: Duration,

    /// How long shutdown waits for each session to finish its in-flight
    /// item before giving up on it.
    pub drain_timeout: Duration,

    /// Whether a submit to a channel with no live session creates one.
    /// When false, such submits fail with `NoActiveSession`.
    pub auto_join: bool,

    /// Disposition of queued items when a session closes.
    pub leave_policy: LeavePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_text_len: 500,
            idle_timeout: Duration::from_secs(300),
            drain_timeout: Duration::from_secs(30),
            auto_join: true,
            leave_policy: LeavePolicy::Persist,
        }
    }
}
