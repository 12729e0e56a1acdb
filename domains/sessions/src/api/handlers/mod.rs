//! HTTP handlers for the sessions domain

pub mod admin;
pub mod attempts;
pub mod results;

use chrono::{DateTime, Utc};
use serde::Serialize;
use skillgate_common::Error;
use uuid::Uuid;

use crate::domain::entities::{RunningStats, SessionStatus, TestSession};

/// A session as returned to clients. The keystroke log is summarized.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_type_id: Uuid,
    pub is_practice: bool,
    pub status: SessionStatus,
    pub time_limit_seconds: Option<i32>,
    pub elapsed_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub score: Option<i32>,
    pub expected_text: Option<String>,
    pub content: Option<serde_json::Value>,
    pub typed_text: String,
    pub cursor_position: usize,
    pub keystroke_count: usize,
    pub stats: Option<RunningStats>,
}

impl SessionResponse {
    pub fn at(session: TestSession, now: DateTime<Utc>) -> Self {
        let elapsed_seconds = session.elapsed_seconds(now);
        let state = session.state.0;
        Self {
            id: session.id,
            user_id: session.user_id,
            test_type_id: session.test_type_id,
            is_practice: session.is_practice,
            status: session.status,
            time_limit_seconds: session.time_limit_seconds,
            elapsed_seconds,
            started_at: session.started_at,
            paused_at: session.paused_at,
            completed_at: session.completed_at,
            cancelled_at: session.cancelled_at,
            cancel_reason: session.cancel_reason,
            score: session.score,
            expected_text: state.expected_text,
            content: state.content,
            typed_text: state.typed_text,
            cursor_position: state.cursor_position,
            keystroke_count: state.keystrokes.len(),
            stats: state.stats,
        }
    }
}

pub(crate) fn session_not_found(id: Uuid) -> Error {
    Error::NotFound(format!("Test session not found: {}", id))
}

pub(crate) fn begin_failed(e: sqlx::Error) -> Error {
    Error::Internal(format!("Failed to begin transaction: {}", e))
}

pub(crate) fn commit_failed(e: sqlx::Error) -> Error {
    Error::Internal(format!("Failed to commit transaction: {}", e))
}
