//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runner with mock implementations.

use crate::db::{Database, DbError, NewTurn};
use crate::llm::{LlmError, LlmRequest, LlmResponse, ModelRegistry};
use crate::state_machine::state::{LearningStyle, TurnState};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored state is corrupt: {0}")]
    Corrupt(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Json(e) => StoreError::Corrupt(e.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Per-thread turn state storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a thread's state; a thread never saved yields a fresh state
    async fn load(&self, thread_id: &str) -> Result<TurnState, StoreError>;

    /// Replace the thread's state as a whole
    async fn save(&self, thread_id: &str, state: &TurnState) -> Result<(), StoreError>;
}

/// Student profile lookups used while running a turn
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `None` when the student is unknown
    async fn learning_style(&self, student_id: &str) -> Result<Option<LearningStyle>, StoreError>;

    /// Record activity; `new_session` marks the first turn of a thread
    async fn touch_student(&self, student_id: &str, new_session: bool) -> Result<(), StoreError>;
}

/// Append-only record of completed turns
#[async_trait]
pub trait TurnLog: Send + Sync {
    async fn record_turn(&self, turn: &NewTurn) -> Result<(), StoreError>;
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete an LLM request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    #[allow(dead_code)] // API completeness
    fn model_id(&self) -> &str;
}

/// Combined storage trait for convenience
pub trait Storage: SessionStore + ProfileStore + TurnLog {}
impl<T: SessionStore + ProfileStore + TurnLog> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load(&self, thread_id: &str) -> Result<TurnState, StoreError> {
        (**self).load(thread_id).await
    }

    async fn save(&self, thread_id: &str, state: &TurnState) -> Result<(), StoreError> {
        (**self).save(thread_id, state).await
    }
}

#[async_trait]
impl<T: ProfileStore + ?Sized> ProfileStore for Arc<T> {
    async fn learning_style(&self, student_id: &str) -> Result<Option<LearningStyle>, StoreError> {
        (**self).learning_style(student_id).await
    }

    async fn touch_student(&self, student_id: &str, new_session: bool) -> Result<(), StoreError> {
        (**self).touch_student(student_id, new_session).await
    }
}

#[async_trait]
impl<T: TurnLog + ?Sized> TurnLog for Arc<T> {
    async fn record_turn(&self, turn: &NewTurn) -> Result<(), StoreError> {
        (**self).record_turn(turn).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn load(&self, thread_id: &str) -> Result<TurnState, StoreError> {
        Ok(self
            .db
            .load_thread(thread_id)?
            .unwrap_or_else(|| TurnState::new(thread_id)))
    }

    async fn save(&self, thread_id: &str, state: &TurnState) -> Result<(), StoreError> {
        if state.thread_id == thread_id {
            self.db.save_thread(state)?;
        } else {
            let mut state = state.clone();
            state.thread_id = thread_id.to_string();
            self.db.save_thread(&state)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for DatabaseStorage {
    async fn learning_style(&self, student_id: &str) -> Result<Option<LearningStyle>, StoreError> {
        match self.db.get_student(student_id) {
            Ok(student) => Ok(Some(student.learning_style)),
            Err(DbError::StudentNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn touch_student(&self, student_id: &str, new_session: bool) -> Result<(), StoreError> {
        self.db.touch_student(student_id, new_session)?;
        Ok(())
    }
}

#[async_trait]
impl TurnLog for DatabaseStorage {
    async fn record_turn(&self, turn: &NewTurn) -> Result<(), StoreError> {
        self.db.record_turn(turn)?;
        Ok(())
    }
}

/// Adapter to use ModelRegistry as LlmClient
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
    model_id: String,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>, model_id: String) -> Self {
        Self { registry, model_id }
    }
}

#[async_trait]
impl LlmClient for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .registry
            .get(&self.model_id)
            .or_else(|| self.registry.default())
            .ok_or_else(|| LlmError::unavailable("No LLM available"))?;
        llm.complete(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
