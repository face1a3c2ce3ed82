//! One voice session: an owned transport connection plus the sequential
//! playback pump that drains its queue.
//!
//! The pump is a single tokio task. It pops the head of the queue, marks the
//! row `in_flight`, synthesizes, streams the audio frame by frame, marks the
//! row `done`, and moves on. There is no intra-session parallelism — the
//! transport carries one audio stream per channel — but every session is an
//! independent task, so a stuck synthesis call on one channel never delays
//! another.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crier_db::DbPool;
use crier_queue::QueueError;
use crier_synth::SynthesisClient;
use crier_types::{RequestStatus, SessionState, SpeechRequest};
use tokio::sync::{mpsc, watch, Mutex};

use crate::config::{EngineConfig, LeavePolicy};
use crate::notify::Notifier;
use crate::transport::{TransportError, TransportHandle, FRAME_BYTES};

/// Commands a session accepts from the manager.
pub(crate) enum SessionCommand {
    /// Append an already-persisted request to the in-memory queue.
    Enqueue(SpeechRequest),
    /// Finish the current item, then close.
    Drain,
}

/// The manager-side view of a live session.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    pub(crate) tx: mpsc::UnboundedSender<SessionCommand>,
    /// Held across the store append + queue send in submit, so store order
    /// and queue order cannot diverge under concurrent submits.
    pub(crate) submit_lock: Arc<Mutex<()>>,
    pub(crate) state: watch::Receiver<SessionState>,
}

/// The shared channel-id → session registry. Sessions remove themselves on
/// every close path.
pub(crate) type SessionMap = Arc<Mutex<HashMap<String, SessionHandle>>>;

/// Why playback of one item had to abort the whole session.
enum PlaybackAbort {
    Transport(TransportError),
}

pub(crate) struct Session {
    channel_id: String,
    queue: VecDeque<SpeechRequest>,
    transport: Box<dyn TransportHandle>,
    pool: DbPool,
    synth: SynthesisClient,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    rx: mpsc::UnboundedReceiver<SessionCommand>,
    state_tx: watch::Sender<SessionState>,
    sessions: SessionMap,
    draining: bool,
}

impl Session {
    /// Spawns the playback pump for one channel and returns its handle.
    ///
    /// `preloaded` is the channel's recovered `pending` backlog, oldest
    /// first; it plays before anything submitted after the join. The
    /// session registers itself in the shared map *before* its task starts,
    /// so a session that closes immediately still removes a handle that is
    /// actually there.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn spawn(
        channel_id: String,
        preloaded: Vec<SpeechRequest>,
        transport: Box<dyn TransportHandle>,
        pool: DbPool,
        synth: SynthesisClient,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
        sessions: SessionMap,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);

        let handle = SessionHandle {
            tx,
            submit_lock: Arc::new(Mutex::new(())),
            state: state_rx,
        };

        let session = Session {
            channel_id: channel_id.clone(),
            queue: preloaded.into(),
            transport,
            pool,
            synth,
            notifier,
            config,
            rx,
            state_tx,
            sessions: sessions.clone(),
            draining: false,
        };

        sessions.lock().await.insert(channel_id, handle);
        // The transport was connected before spawn; the session is
        // observable as idle from the moment its handle exists.
        session.state_tx.send_replace(SessionState::Idle);
        tokio::spawn(session.run());
    }

    async fn run(mut self) {
        tracing::info!(
            channel = %self.channel_id,
            backlog = self.queue.len(),
            "voice session started"
        );

        loop {
            self.poll_commands();

            if self.draining {
                break;
            }

            let Some(request) = self.queue.pop_front() else {
                self.set_state(SessionState::Idle);
                tokio::select! {
                    cmd = self.rx.recv() => match cmd {
                        Some(cmd) => self.apply_command(cmd),
                        // Manager dropped every sender; treat as a leave.
                        None => self.draining = true,
                    },
                    _ = tokio::time::sleep(self.config.idle_timeout) => {
                        tracing::info!(
                            channel = %self.channel_id,
                            idle_secs = self.config.idle_timeout.as_secs(),
                            "idle timeout, releasing voice channel"
                        );
                        self.draining = true;
                    }
                }
                continue;
            };

            self.set_state(SessionState::Playing);
            match self.play(&request).await {
                Ok(()) => {}
                Err(PlaybackAbort::Transport(e)) => {
                    // The row stays in_flight; recovery replays it as
                    // pending on the next startup/rejoin.
                    tracing::error!(
                        channel = %self.channel_id,
                        request_id = request.id,
                        error = %e,
                        "transport failure mid-stream, closing session"
                    );
                    self.close(false).await;
                    return;
                }
            }
        }

        self.set_state(SessionState::Draining);
        self.close(true).await;
    }

    /// Plays one item to completion.
    ///
    /// Synthesis failure (after the client's own retries) marks the row
    /// `failed`, reports it, and returns `Ok` — one bad item never blocks
    /// the channel. Only a transport failure aborts the session.
    async fn play(&mut self, request: &SpeechRequest) -> Result<(), PlaybackAbort> {
        self.set_status(request.id, RequestStatus::InFlight).await;

        let audio = match self
            .synth
            .synthesize(&request.text, &request.voice_params)
            .await
        {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(
                    channel = %self.channel_id,
                    request_id = request.id,
                    error = %e,
                    "synthesis failed, skipping item"
                );
                self.set_status(request.id, RequestStatus::Failed).await;
                self.notifier
                    .playback_failed(
                        &self.channel_id,
                        &request.requester_id,
                        request.id,
                        &e.to_string(),
                    )
                    .await;
                return Ok(());
            }
        };

        for frame in audio.chunks(FRAME_BYTES) {
            self.transport
                .send_frame(frame)
                .await
                .map_err(PlaybackAbort::Transport)?;
        }

        self.set_status(request.id, RequestStatus::Done).await;
        tracing::debug!(
            channel = %self.channel_id,
            request_id = request.id,
            bytes = audio.len(),
            "item played"
        );
        Ok(())
    }

    /// Drains every command currently sitting in the mailbox.
    fn poll_commands(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            self.apply_command(cmd);
        }
    }

    fn apply_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Enqueue(request) => {
                if self.draining {
                    // Too late for this session; the row is pending in the
                    // store and plays on the next join.
                    tracing::debug!(
                        channel = %self.channel_id,
                        request_id = request.id,
                        "enqueue raced with drain, left pending in store"
                    );
                } else {
                    self.queue.push_back(request);
                }
            }
            SessionCommand::Drain => self.draining = true,
        }
    }

    /// Tears the session down: applies the leave policy to whatever is
    /// still queued, removes the session from the registry, and releases
    /// the transport handle. Runs on every close path.
    async fn close(&mut self, apply_leave_policy: bool) {
        self.sessions.lock().await.remove(&self.channel_id);

        if apply_leave_policy && !self.queue.is_empty() {
            match self.config.leave_policy {
                LeavePolicy::Persist => {
                    tracing::info!(
                        channel = %self.channel_id,
                        remaining = self.queue.len(),
                        "leaving queued items pending for later resume"
                    );
                }
                LeavePolicy::Discard => {
                    // Only the ids this session holds. A row persisted by a
                    // submit that raced the drain was acknowledged to its
                    // requester and stays pending for the next join.
                    let ids: Vec<i64> = self.queue.iter().map(|r| r.id).collect();
                    let removed = self
                        .with_store(move |conn, _| crier_queue::delete_requests(conn, &ids))
                        .await;
                    if let Some(count) = removed {
                        tracing::info!(
                            channel = %self.channel_id,
                            discarded = count,
                            "discarded remaining queue on leave"
                        );
                    }
                }
            }
        }
        self.queue.clear();

        self.transport.disconnect().await;
        self.set_state(SessionState::Closed);
        tracing::info!(channel = %self.channel_id, "voice session closed");
    }

    /// Best-effort status write. Durability gates only the submit path; a
    /// failed mid-playback write is logged and playback continues.
    async fn set_status(&self, id: i64, status: RequestStatus) {
        let updated = self
            .with_store(move |conn, _| crier_queue::update_status(conn, id, status))
            .await;
        if updated.is_none() {
            tracing::warn!(
                channel = %self.channel_id,
                request_id = id,
                status = status.as_str(),
                "failed to persist status update"
            );
        }
    }

    /// Runs a store operation on the blocking pool, logging failures.
    async fn with_store<T, F>(&self, op: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection, &str) -> Result<T, QueueError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let channel = self.channel_id.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<T, String> {
            let conn = pool.get().map_err(|e| e.to_string())?;
            op(&conn, &channel).map_err(|e| e.to_string())
        })
        .await;

        match result {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(channel = %self.channel_id, error = %e, "queue store operation failed");
                None
            }
            Err(e) => {
                tracing::warn!(channel = %self.channel_id, error = %e, "queue store task panicked");
                None
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        // send_replace never fails; receivers may long be gone.
        self.state_tx.send_replace(state);
    }
}
