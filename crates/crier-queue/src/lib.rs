//! Durable speech-request store.
//!
//! Every submitted request is written here *before* the submit is
//! acknowledged, and updated as it moves through playback. The table is the
//! crash-recovery source of truth: on startup, rows left `pending` or
//! `in_flight` are re-queued (in_flight conservatively replays — losing an
//! item is worse than repeating it).
//!
//! All writes go through single statements; concurrent appends from
//! different channels interleave at the row level with no application-side
//! locking. Ordering within a channel is the `id` column (AUTOINCREMENT),
//! which is also the playback order.

use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use crier_types::{RequestStatus, SpeechRequest, VoiceParams};

/// Errors that can occur during queue store operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("speech request not found: {0}")]
    NotFound(i64),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Appends a new request with status `Pending` and returns the stored row.
///
/// The id is assigned by SQLite and is monotonically increasing; within a
/// channel it defines playback order. This must succeed before the submit
/// that produced the request is acknowledged.
///
/// # Errors
///
/// Returns `QueueError::Database` if the row cannot be written — the caller
/// must fail the submit rather than enqueue the request in memory only.
pub fn append(
    conn: &Connection,
    channel_id: &str,
    requester_id: &str,
    text: &str,
    voice_params: &VoiceParams,
) -> Result<SpeechRequest, QueueError> {
    let params_json = serde_json::to_string(voice_params)?;

    let (id, enqueued_at) = conn.query_row(
        "INSERT INTO speech_requests (channel_id, requester_id, text, voice_params, status)
         VALUES (?1, ?2, ?3, ?4, 'pending')
         RETURNING id, enqueued_at",
        params![channel_id, requester_id, text, params_json],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?;

    Ok(SpeechRequest {
        id,
        channel_id: channel_id.to_string(),
        requester_id: requester_id.to_string(),
        text: text.to_string(),
        voice_params: voice_params.clone(),
        status: RequestStatus::Pending,
        enqueued_at,
    })
}

/// Sets the status of a request. Idempotent — repeating the same update is a
/// no-op.
///
/// # Errors
///
/// Returns `QueueError::NotFound` if no row has the given id.
pub fn update_status(conn: &Connection, id: i64, status: RequestStatus) -> Result<(), QueueError> {
    let count = conn.execute(
        "UPDATE speech_requests SET status = ?2 WHERE id = ?1",
        params![id, status.as_str()],
    )?;
    if count == 0 {
        return Err(QueueError::NotFound(id));
    }
    Ok(())
}

/// Retrieves a request by id.
pub fn get_request(conn: &Connection, id: i64) -> Result<SpeechRequest, QueueError> {
    conn.query_row(
        "SELECT id, channel_id, requester_id, text, voice_params, status, enqueued_at
         FROM speech_requests WHERE id = ?1",
        [id],
        map_row_to_request,
    )
    .optional()?
    .ok_or(QueueError::NotFound(id))
}

/// Returns the `Pending` requests for one channel, oldest first.
///
/// Used to preload a session's in-memory queue when a channel is (re)joined
/// after a restart.
pub fn pending_for_channel(
    conn: &Connection,
    channel_id: &str,
) -> Result<Vec<SpeechRequest>, QueueError> {
    let mut stmt = conn.prepare(
        "SELECT id, channel_id, requester_id, text, voice_params, status, enqueued_at
         FROM speech_requests
         WHERE channel_id = ?1 AND status = 'pending'
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([channel_id], map_row_to_request)?;
    let mut requests = Vec::new();
    for row in rows {
        requests.push(row?);
    }
    Ok(requests)
}

/// Startup recovery: re-queues interrupted work.
///
/// Flips every `in_flight` row back to `pending` (there is no way to know
/// whether the item finished playing before the crash, so it is replayed —
/// at-least-once), then returns all `pending` rows grouped by channel,
/// oldest first. Call once before any session activity.
pub fn recover_pending(conn: &Connection) -> Result<Vec<SpeechRequest>, QueueError> {
    conn.execute(
        "UPDATE speech_requests SET status = 'pending' WHERE status = 'in_flight'",
        [],
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, channel_id, requester_id, text, voice_params, status, enqueued_at
         FROM speech_requests
         WHERE status = 'pending'
         ORDER BY channel_id ASC, id ASC",
    )?;

    let rows = stmt.query_map([], map_row_to_request)?;
    let mut requests = Vec::new();
    for row in rows {
        requests.push(row?);
    }
    Ok(requests)
}

/// Deletes the given requests by id. Returns the number of rows removed.
///
/// Used by the `Discard` leave policy when a session closes with work still
/// queued. Only the ids the session actually held are named here — a row a
/// concurrent submit persisted after the drain began is not the session's
/// to discard.
pub fn delete_requests(conn: &Connection, ids: &[i64]) -> Result<usize, QueueError> {
    let mut removed = 0;
    for id in ids {
        removed += conn.execute("DELETE FROM speech_requests WHERE id = ?1", [id])?;
    }
    Ok(removed)
}

/// Deletes a single request by id.
///
/// Used to roll back a row whose submit could not be acknowledged (the
/// session closed between the append and the in-memory enqueue), so a
/// rejected submit does not replay later.
pub fn delete_request(conn: &Connection, id: i64) -> Result<(), QueueError> {
    conn.execute("DELETE FROM speech_requests WHERE id = ?1", [id])?;
    Ok(())
}

fn map_row_to_request(row: &Row) -> rusqlite::Result<SpeechRequest> {
    let params_json: String = row.get(4)?;
    let voice_params: VoiceParams = serde_json::from_str(&params_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status_str: String = row.get(5)?;
    let status = RequestStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown status: {status_str}").into(),
        )
    })?;

    Ok(SpeechRequest {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        requester_id: row.get(2)?,
        text: row.get(3)?,
        voice_params,
        status,
        enqueued_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crier_db::run_migrations;
    use rusqlite::Connection;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let conn = setup_db();
        let params = VoiceParams::default();

        let a = append(&conn, "c1", "u1", "first", &params).expect("append failed");
        let b = append(&conn, "c1", "u1", "second", &params).expect("append failed");
        let c = append(&conn, "c2", "u2", "other channel", &params).expect("append failed");

        assert!(a.id < b.id);
        assert!(b.id < c.id);
        assert_eq!(a.status, RequestStatus::Pending);
        assert!(!a.enqueued_at.is_empty());
    }

    #[test]
    fn pending_for_channel_is_ordered_and_scoped() {
        let conn = setup_db();
        let params = VoiceParams::default();

        append(&conn, "c1", "u1", "one", &params).expect("append failed");
        let two = append(&conn, "c1", "u1", "two", &params).expect("append failed");
        append(&conn, "c2", "u1", "elsewhere", &params).expect("append failed");
        update_status(&conn, two.id, RequestStatus::Done).expect("update failed");

        let pending = pending_for_channel(&conn, "c1").expect("query failed");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].text, "one");
    }

    #[test]
    fn update_status_is_idempotent() {
        let conn = setup_db();
        let req = append(&conn, "c1", "u1", "hello", &VoiceParams::default())
            .expect("append failed");

        update_status(&conn, req.id, RequestStatus::InFlight).expect("first update failed");
        update_status(&conn, req.id, RequestStatus::InFlight).expect("repeat update failed");

        let fetched = get_request(&conn, req.id).expect("get failed");
        assert_eq!(fetched.status, RequestStatus::InFlight);
    }

    #[test]
    fn update_status_unknown_id_is_not_found() {
        let conn = setup_db();
        let err = update_status(&conn, 999, RequestStatus::Done).unwrap_err();
        match err {
            QueueError::NotFound(id) => assert_eq!(id, 999),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn recover_replays_in_flight_as_pending_oldest_first() {
        let conn = setup_db();
        let params = VoiceParams::default();

        // Simulated crash: one item was mid-playback, one still queued.
        let first = append(&conn, "cx", "u1", "interrupted", &params).expect("append failed");
        let second = append(&conn, "cx", "u1", "queued", &params).expect("append failed");
        update_status(&conn, first.id, RequestStatus::InFlight).expect("update failed");

        let recovered = recover_pending(&conn).expect("recovery failed");
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered[0].id, first.id);
        assert_eq!(recovered[0].status, RequestStatus::Pending);
        assert_eq!(recovered[1].id, second.id);
    }

    #[test]
    fn recover_groups_by_channel() {
        let conn = setup_db();
        let params = VoiceParams::default();

        append(&conn, "zz", "u1", "late channel", &params).expect("append failed");
        append(&conn, "aa", "u1", "early channel", &params).expect("append failed");
        append(&conn, "zz", "u1", "late again", &params).expect("append failed");

        let recovered = recover_pending(&conn).expect("recovery failed");
        let channels: Vec<&str> = recovered.iter().map(|r| r.channel_id.as_str()).collect();
        assert_eq!(channels, vec!["aa", "zz", "zz"]);
    }

    #[test]
    fn delete_requests_removes_only_named_rows() {
        let conn = setup_db();
        let params = VoiceParams::default();

        let done = append(&conn, "c1", "u1", "played", &params).expect("append failed");
        update_status(&conn, done.id, RequestStatus::Done).expect("update failed");
        let dropped = append(&conn, "c1", "u1", "discarded", &params).expect("append failed");
        let kept = append(&conn, "c1", "u1", "still queued", &params).expect("append failed");

        let removed = delete_requests(&conn, &[dropped.id]).expect("delete failed");
        assert_eq!(removed, 1);

        assert_eq!(
            get_request(&conn, done.id).expect("get failed").status,
            RequestStatus::Done
        );
        let pending = pending_for_channel(&conn, "c1").expect("query failed");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, kept.id);
    }

    #[test]
    fn voice_params_round_trip_through_storage() {
        let conn = setup_db();
        let params = VoiceParams {
            voice: "en-amy".to_string(),
            rate: 1.25,
            style: Some("narration".to_string()),
        };

        let req = append(&conn, "c1", "u1", "styled", &params).expect("append failed");
        let fetched = get_request(&conn, req.id).expect("get failed");
        assert_eq!(fetched.voice_params, params);
    }
}
