//! Voice synthesis parameter definitions.
//!
//! A `VoiceParams` value selects which voice the synthesis service uses and
//! how the speech is shaped. It travels with every speech request and is
//! persisted alongside it as JSON.

use serde::{Deserialize, Serialize};

/// Parameters controlling how a piece of text is rendered to speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Identifier of the voice to use (service-specific).
    pub voice: String,
    /// Speech rate multiplier (1.0 is normal).
    #[serde(default = "default_rate")]
    pub rate: f32,
    /// Optional speaking style hint (e.g. "narration", "cheerful").
    #[serde(default)]
    pub style: Option<String>,
}

fn default_rate() -> f32 {
    1.0
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: "default".to_string(),
            rate: 1.0,
            style: None,
        }
    }
}
