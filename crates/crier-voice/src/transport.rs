//! The real-time voice transport boundary.
//!
//! The chat platform's voice layer owns the wire protocol; the engine only
//! needs to open a connection per channel, push audio frames through it, and
//! close it. Implementations live outside this crate — [`NullTransport`] is
//! the discarding stand-in used when no platform layer is wired in, and by
//! tests.

use async_trait::async_trait;
use thiserror::Error;

/// Bytes per audio frame: 20 ms of 48 kHz s16le stereo PCM.
pub const FRAME_BYTES: usize = 3840;

/// Errors at the transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection to the voice channel could not be opened.
    #[error("voice transport unavailable: {0}")]
    Unavailable(String),

    /// A frame send failed (mid-stream disconnect, congestion collapse).
    #[error("voice transport send failed: {0}")]
    Send(String),
}

/// Factory for per-channel voice connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a connection to the given voice channel.
    async fn connect(&self, channel_id: &str)
        -> Result<Box<dyn TransportHandle>, TransportError>;
}

/// An open voice connection, exclusively owned by one session. The session
/// task holds it across `.await` points, so implementations must be
/// `Send + Sync`; all methods take `&mut self`.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Sends one audio frame. The transport acknowledges each frame; that
    /// backpressure is what paces the playback pump.
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Closes the connection. Infallible by contract — a connection that
    /// fails to close cleanly is still gone.
    async fn disconnect(&mut self);
}

/// A transport that accepts every frame and discards it.
#[derive(Debug, Clone, Default)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn connect(
        &self,
        channel_id: &str,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        tracing::debug!(channel = channel_id, "null transport connected");
        Ok(Box::new(NullHandle))
    }
}

struct NullHandle;

#[async_trait]
impl TransportHandle for NullHandle {
    async fn send_frame(&mut self, _frame: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&mut self) {}
}
