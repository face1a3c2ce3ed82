//! Voice session engine for the crier bot.
//!
//! Owns per-channel playback state: the [`SessionManager`] maps voice
//! channels to live sessions, each session runs a sequential playback pump
//! that turns queued text into streamed audio, and the [`Transport`] and
//! [`Notifier`] traits mark the boundaries to the chat platform's voice
//! layer and messaging layer.
//!
//! Channels are fully independent: each session is its own tokio task with
//! exclusive ownership of its transport handle and in-memory queue. The only
//! shared resource is the SQLite queue store, which every submit writes
//! through *before* the request is acknowledged.

pub mod config;
pub mod error;
pub mod manager;
pub mod notify;
mod session;
pub mod transport;

pub use config::{EngineConfig, LeavePolicy};
pub use error::EngineError;
pub use manager::SessionManager;
pub use notify::{LogNotifier, Notifier};
pub use transport::{NullTransport, Transport, TransportError, TransportHandle, FRAME_BYTES};
