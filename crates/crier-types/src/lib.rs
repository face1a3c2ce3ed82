//! Shared types for the crier voice bot.
//!
//! This crate provides the foundational types used across all crier crates:
//! the speech request model, voice synthesis parameters, and session state.
//!
//! No crate in the workspace depends on anything *except* `crier-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

mod request;
mod session;
mod voice;

pub use request::{RequestStatus, SpeechRequest};
pub use session::SessionState;
pub use voice::VoiceParams;
