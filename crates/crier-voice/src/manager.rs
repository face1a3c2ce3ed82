//! The session manager: routes joins, leaves, and speech submissions to
//! per-channel sessions.
//!
//! The manager owns the channel-id → session map and is the only way other
//! components interact with a session. Sessions remove themselves from the
//! map when they close, so a lookup hitting the map always finds a live (or
//! at worst, currently-closing) pump.

use std::collections::HashMap;
use std::sync::Arc;

use crier_db::DbPool;
use crier_synth::SynthesisClient;
use crier_types::{SessionState, SpeechRequest, VoiceParams};
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::notify::Notifier;
use crate::session::{Session, SessionCommand, SessionHandle, SessionMap};
use crate::transport::Transport;

pub struct SessionManager {
    sessions: SessionMap,
    /// Serializes session creation so two concurrent joins for the same
    /// channel cannot both open a transport connection.
    join_lock: Mutex<()>,
    pool: DbPool,
    synth: SynthesisClient,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl SessionManager {
    pub fn new(
        pool: DbPool,
        synth: SynthesisClient,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            join_lock: Mutex::new(()),
            pool,
            synth,
            transport,
            notifier,
            config,
        }
    }

    /// Joins a voice channel, creating a session if none exists.
    ///
    /// Idempotent: joining an already-joined channel is a no-op. On session
    /// creation, the channel's recovered `pending` backlog is loaded oldest
    /// first, so text queued before a restart plays before anything new.
    ///
    /// # Errors
    ///
    /// Returns `TransportUnavailable` if the voice connection cannot be
    /// opened, or `StoreUnavailable` if the backlog cannot be read. No
    /// session is created on failure.
    pub async fn join(&self, channel_id: &str) -> Result<(), EngineError> {
        let _guard = self.join_lock.lock().await;

        if self.sessions.lock().await.contains_key(channel_id) {
            return Ok(());
        }

        let mut transport_handle = self.transport.connect(channel_id).await.map_err(|e| {
            EngineError::TransportUnavailable {
                channel_id: channel_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        let preloaded = match self.load_backlog(channel_id).await {
            Ok(backlog) => backlog,
            Err(e) => {
                transport_handle.disconnect().await;
                return Err(e);
            }
        };

        Session::spawn(
            channel_id.to_string(),
            preloaded,
            transport_handle,
            self.pool.clone(),
            self.synth.clone(),
            self.notifier.clone(),
            self.config.clone(),
            self.sessions.clone(),
        )
        .await;

        tracing::info!(channel = channel_id, "joined voice channel");
        Ok(())
    }

    /// Signals a channel's session to drain and close.
    ///
    /// The session finishes its current item fully (audio is never cut
    /// mid-sentence), applies the configured leave policy to the rest of
    /// its queue, then releases the transport. Idempotent if no session
    /// exists.
    pub async fn leave(&self, channel_id: &str) {
        let handle = self.sessions.lock().await.get(channel_id).cloned();
        match handle {
            Some(handle) => {
                // Send failure means the session is already closing.
                let _ = handle.tx.send(SessionCommand::Drain);
                tracing::info!(channel = channel_id, "leave requested");
            }
            None => {
                tracing::debug!(channel = channel_id, "leave for channel with no session");
            }
        }
    }

    /// Submits text for playback on a channel.
    ///
    /// Validates the text, resolves the session (auto-joining if the policy
    /// allows), persists the request, and appends it to the session's
    /// queue. The persisted row and the in-memory queue position are
    /// assigned under the session's submit lock, so concurrent submits on
    /// the same channel can never reorder relative to the store.
    ///
    /// # Errors
    ///
    /// `EmptyText` / `TextTooLong` for invalid input (nothing is enqueued),
    /// `NoActiveSession` when auto-join is disabled, `StoreUnavailable` if
    /// the durable append fails (the request is not accepted), or
    /// `SessionClosed` if the session went away mid-submit.
    pub async fn submit(
        &self,
        channel_id: &str,
        text: &str,
        requester_id: &str,
        voice_params: VoiceParams,
    ) -> Result<i64, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyText);
        }
        let len = text.chars().count();
        if len > self.config.max_text_len {
            return Err(EngineError::TextTooLong {
                len,
                max: self.config.max_text_len,
            });
        }

        let handle = match self.lookup(channel_id).await {
            Some(handle) => handle,
            None if self.config.auto_join => {
                self.join(channel_id).await?;
                self.lookup(channel_id)
                    .await
                    .ok_or_else(|| EngineError::SessionClosed(channel_id.to_string()))?
            }
            None => return Err(EngineError::NoActiveSession(channel_id.to_string())),
        };

        let _guard = handle.submit_lock.lock().await;

        let record = self
            .append_record(channel_id, requester_id, text, &voice_params)
            .await?;
        let id = record.id;

        if handle.tx.send(SessionCommand::Enqueue(record)).is_err() {
            // The session closed between lookup and enqueue. Roll the row
            // back so a rejected submit cannot replay later.
            self.rollback_record(id).await;
            return Err(EngineError::SessionClosed(channel_id.to_string()));
        }

        tracing::debug!(channel = channel_id, request_id = id, "speech request queued");
        Ok(id)
    }

    /// Returns the live channels and their session states.
    pub async fn active_channels(&self) -> Vec<(String, SessionState)> {
        self.sessions
            .lock()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), *handle.state.borrow()))
            .collect()
    }

    /// Returns the state of one channel's session, if live.
    pub async fn session_state(&self, channel_id: &str) -> Option<SessionState> {
        self.sessions
            .lock()
            .await
            .get(channel_id)
            .map(|handle| *handle.state.borrow())
    }

    /// Closes every live session, waiting up to the drain timeout per
    /// session for its in-flight item to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, SessionHandle)> = self
            .sessions
            .lock()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        if handles.is_empty() {
            return;
        }

        tracing::info!(sessions = handles.len(), "draining all voice sessions");
        for (_, handle) in &handles {
            let _ = handle.tx.send(SessionCommand::Drain);
        }

        for (channel_id, mut handle) in handles {
            let closed = tokio::time::timeout(
                self.config.drain_timeout,
                handle.state.wait_for(|s| *s == SessionState::Closed),
            )
            .await;
            if closed.is_err() {
                tracing::warn!(
                    channel = %channel_id,
                    "session did not close within drain timeout"
                );
            }
        }
    }

    async fn lookup(&self, channel_id: &str) -> Option<SessionHandle> {
        self.sessions.lock().await.get(channel_id).cloned()
    }

    async fn load_backlog(&self, channel_id: &str) -> Result<Vec<SpeechRequest>, EngineError> {
        let pool = self.pool.clone();
        let channel = channel_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
            crier_queue::pending_for_channel(&conn, &channel)
                .map_err(|e| EngineError::StoreUnavailable(e.to_string()))
        })
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?
    }

    async fn append_record(
        &self,
        channel_id: &str,
        requester_id: &str,
        text: &str,
        voice_params: &VoiceParams,
    ) -> Result<SpeechRequest, EngineError> {
        let pool = self.pool.clone();
        let channel = channel_id.to_string();
        let requester = requester_id.to_string();
        let text = text.to_string();
        let params = voice_params.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
            crier_queue::append(&conn, &channel, &requester, &text, &params)
                .map_err(|e| EngineError::StoreUnavailable(e.to_string()))
        })
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?
    }

    /// Best-effort removal of a row that was never acknowledged.
    async fn rollback_record(&self, id: i64) {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<(), String> {
            let conn = pool.get().map_err(|e| e.to_string())?;
            crier_queue::delete_request(&conn, id).map_err(|e| e.to_string())
        })
        .await;

        if !matches!(result, Ok(Ok(()))) {
            tracing::warn!(request_id = id, "failed to roll back unacknowledged request");
        }
    }
}
