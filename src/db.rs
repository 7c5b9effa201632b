//! Database module for StudyBuddy
//!
//! Provides persistence for thread state, turn records and student profiles.

mod schema;

pub use schema::*;

use crate::state_machine::state::{Difficulty, Intent, LearningStyle, TurnState};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt stored state: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),
    #[error("Student not found: {0}")]
    StudentNotFound(String),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        // Databases created before session counting lack the column; fails harmlessly otherwise
        let _ = conn.execute(
            "ALTER TABLE students ADD COLUMN total_sessions INTEGER NOT NULL DEFAULT 0",
            [],
        );
        Ok(())
    }

    // ==================== Thread Operations ====================

    /// Get a thread with its stored state
    pub fn get_thread(&self, id: &str) -> DbResult<ThreadRecord> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, state, created_at, updated_at FROM threads WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let (id, state_json, created_at, updated_at) =
            row.ok_or_else(|| DbError::ThreadNotFound(id.to_string()))?;
        Ok(ThreadRecord {
            id,
            state: serde_json::from_str(&state_json)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    /// Load a thread's state, `None` if the thread has never been saved
    pub fn load_thread(&self, id: &str) -> DbResult<Option<TurnState>> {
        match self.get_thread(id) {
            Ok(record) => Ok(Some(record.state)),
            Err(DbError::ThreadNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert or fully replace a thread's state
    pub fn save_thread(&self, state: &TurnState) -> DbResult<()> {
        let conn = self.conn()?;
        let state_json = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO threads (id, state, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![state.thread_id, state_json, now],
        )?;
        Ok(())
    }

    // ==================== Turn Operations ====================

    /// Append a turn record, returning its id
    pub fn record_turn(&self, turn: &NewTurn) -> DbResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO turns (thread_id, user_message, assistant_response, intent, subject, topic,
                                difficulty, handled_by, score, mastery_update, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                turn.thread_id,
                turn.user_message,
                turn.assistant_response,
                turn.intent.map(Intent::as_str),
                turn.subject,
                turn.topic,
                turn.difficulty.map(Difficulty::as_str),
                turn.handled_by,
                turn.score,
                turn.mastery_update,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All turn records of a thread, oldest first
    pub fn turns_for_thread(&self, thread_id: &str) -> DbResult<Vec<TurnRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, user_message, assistant_response, intent, subject, topic,
                    difficulty, handled_by, score, mastery_update, created_at
             FROM turns WHERE thread_id = ?1 ORDER BY id",
        )?;

        let turns = stmt
            .query_map(params![thread_id], |row| {
                Ok(TurnRecord {
                    id: row.get(0)?,
                    thread_id: row.get(1)?,
                    user_message: row.get(2)?,
                    assistant_response: row.get(3)?,
                    intent: row.get(4)?,
                    subject: row.get(5)?,
                    topic: row.get(6)?,
                    difficulty: row.get(7)?,
                    handled_by: row.get(8)?,
                    score: row.get(9)?,
                    mastery_update: row.get(10)?,
                    created_at: parse_datetime(&row.get::<_, String>(11)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(turns)
    }

    // ==================== Student Operations ====================

    /// Create a student or update an existing one; a missing name keeps the stored one
    pub fn upsert_student(
        &self,
        id: &str,
        name: Option<&str>,
        learning_style: LearningStyle,
    ) -> DbResult<Student> {
        {
            let conn = self.conn()?;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO students (id, name, learning_style, created_at, last_active)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     name = COALESCE(excluded.name, students.name),
                     learning_style = excluded.learning_style",
                params![id, name, learning_style.as_str(), now],
            )?;
        }
        self.get_student(id)
    }

    /// Get a student profile by ID
    pub fn get_student(&self, id: &str) -> DbResult<Student> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, learning_style, total_sessions, created_at, last_active
             FROM students WHERE id = ?1",
            params![id],
            |row| {
                let style: String = row.get(2)?;
                Ok(Student {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    learning_style: style.parse().unwrap_or_default(),
                    total_sessions: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    last_active: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )
        .optional()?
        .ok_or_else(|| DbError::StudentNotFound(id.to_string()))
    }

    /// Mark a student as active now, counting a session when `new_session` is set.
    /// Returns false for an unknown student.
    pub fn touch_student(&self, id: &str, new_session: bool) -> DbResult<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE students SET last_active = ?1, total_sessions = total_sessions + ?2
             WHERE id = ?3",
            params![Utc::now().to_rfc3339(), i64::from(new_session), id],
        )?;
        Ok(updated > 0)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
