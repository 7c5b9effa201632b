//! Database schema and types

use crate::state_machine::state::{Difficulty, Intent, LearningStyle, TurnState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS threads (
    id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_threads_updated ON threads(updated_at DESC);

CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL,
    user_message TEXT NOT NULL,
    assistant_response TEXT NOT NULL,
    intent TEXT,
    subject TEXT,
    topic TEXT,
    difficulty TEXT,
    handled_by TEXT,
    score REAL,
    mastery_update TEXT,
    created_at TEXT NOT NULL,

    FOREIGN KEY (thread_id) REFERENCES threads(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_turns_thread ON turns(thread_id, id);

CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY,
    name TEXT,
    learning_style TEXT NOT NULL DEFAULT 'balanced',
    total_sessions INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_active TEXT NOT NULL
);
";

/// Persisted thread row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadRecord {
    pub id: String,
    pub state: TurnState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One completed turn, as appended after the thread state is saved
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTurn {
    pub thread_id: String,
    pub user_message: String,
    pub assistant_response: String,
    /// Set only when the message was classified this turn
    pub intent: Option<Intent>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Role whose output produced the response; `None` for direct replies
    pub handled_by: Option<String>,
    pub score: Option<f64>,
    pub mastery_update: Option<String>,
}

impl NewTurn {
    /// Record of the exchange that closed `state`'s last turn
    pub fn from_state(state: &TurnState) -> Self {
        Self {
            thread_id: state.thread_id.clone(),
            user_message: state.last_user_message.clone(),
            assistant_response: state.response.clone(),
            intent: state.intent,
            subject: state.subject.clone(),
            topic: state.topic.clone(),
            difficulty: state.difficulty,
            ..Self::default()
        }
    }
}

/// Stored turn row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnRecord {
    pub id: i64,
    pub thread_id: String,
    pub user_message: String,
    pub assistant_response: String,
    pub intent: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub handled_by: Option<String>,
    pub score: Option<f64>,
    pub mastery_update: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Student profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: Option<String>,
    pub learning_style: LearningStyle,
    /// Threads the student has started
    pub total_sessions: u32,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}
