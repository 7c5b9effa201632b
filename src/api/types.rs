//! API request and response types

use crate::db::{Student, ThreadRecord, TurnRecord};
use crate::runtime::{TurnMetadata, TurnOutcome};
use crate::state_machine::state::{Difficulty, Intent, LogEntry, Mode, NextAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Continue an existing thread; absent or empty starts a new one
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub thread_id: String,
    pub next_action: Option<NextAction>,
    pub metadata: TurnMetadata,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            response: outcome.response,
            thread_id: outcome.thread_id,
            next_action: outcome.next_action,
            metadata: outcome.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Point-in-time view of a thread
#[derive(Debug, Serialize)]
pub struct ThreadSnapshot {
    pub thread_id: String,
    pub mode: Mode,
    pub next_action: Option<NextAction>,
    pub intent: Option<Intent>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub message_log: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ThreadRecord> for ThreadSnapshot {
    fn from(record: ThreadRecord) -> Self {
        let state = record.state;
        Self {
            thread_id: record.id,
            mode: state.mode,
            next_action: match state.next_action {
                NextAction::None => None,
                other => Some(other),
            },
            intent: state.intent,
            subject: state.subject,
            topic: state.topic,
            difficulty: state.difficulty,
            message_log: state.message_log,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TurnListResponse {
    pub turns: Vec<TurnRecord>,
}

/// Create or update a student profile
#[derive(Debug, Deserialize)]
pub struct StudentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub learning_style: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub student: Student,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
