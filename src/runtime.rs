//! Runtime for executing turns
//!
//! The `SessionRunner` owns the load, transition and save cycle for each
//! incoming message. Turns on the same thread run one at a time; turns on
//! different threads run in parallel.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{EvaluationSummary, TurnExecutor, TurnReport};
pub use traits::*;

use crate::db::NewTurn;
use crate::roles::{Role, RoleFailure, RoleGateway};
use crate::state_machine::{
    Intent, LearningStyle, NextAction, OverrideDetector, TransitionError, TurnContext, TurnState,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

/// Type alias for the production runner
pub type ProductionRunner = SessionRunner<DatabaseStorage, Arc<dyn RoleGateway>>;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Role(#[from] RoleFailure),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("failed to save thread state: {0}")]
    Store(StoreError),
    #[error("turn task failed: {0}")]
    Internal(String),
}

/// One inbound message
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub message: String,
    /// Absent or empty starts a new thread
    pub thread_id: Option<String>,
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnMetadata {
    pub intent: Option<Intent>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub has_active_quiz: bool,
}

/// What the caller gets back from a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub response: String,
    pub thread_id: String,
    /// `None` when nothing particular is expected next
    pub next_action: Option<NextAction>,
    pub metadata: TurnMetadata,
}

impl TurnOutcome {
    fn from_state(state: &TurnState) -> Self {
        Self {
            response: state.response.clone(),
            thread_id: state.thread_id.clone(),
            next_action: match state.next_action {
                NextAction::None => None,
                other => Some(other),
            },
            metadata: TurnMetadata {
                intent: state.intent,
                subject: state.subject.clone(),
                topic: state.topic.clone(),
                has_active_quiz: state.active_quiz().is_some(),
            },
        }
    }
}

/// Generate an identifier for a new thread
pub fn new_thread_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("thread_{}", &id[..8])
}

/// Runs turns against a store and a role gateway
pub struct SessionRunner<S, G> {
    inner: Arc<RunnerInner<S, G>>,
}

impl<S, G> Clone for SessionRunner<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct RunnerInner<S, G> {
    storage: S,
    gateway: G,
    override_detector: Arc<dyn OverrideDetector>,
    locks: ThreadLocks,
}

impl<S, G> SessionRunner<S, G>
where
    S: Storage + 'static,
    G: RoleGateway + 'static,
{
    pub fn new(storage: S, gateway: G, override_detector: Arc<dyn OverrideDetector>) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                storage,
                gateway,
                override_detector,
                locks: ThreadLocks::default(),
            }),
        }
    }

    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    /// Handle one message end to end.
    ///
    /// The turn runs on its own task: if the caller stops waiting, the turn
    /// still completes and its state is saved.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome, TurnError> {
        if request.message.trim().is_empty() {
            return Err(TurnError::Validation("message must not be empty".to_string()));
        }

        let thread_id = request
            .thread_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_thread_id);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner
                .run_turn(thread_id, request.message, request.student_id)
                .await
        })
        .await
        .map_err(|e| TurnError::Internal(e.to_string()))?
    }
}

impl<S, G> RunnerInner<S, G>
where
    S: Storage,
    G: RoleGateway,
{
    async fn run_turn(
        &self,
        thread_id: String,
        message: String,
        student_id: Option<String>,
    ) -> Result<TurnOutcome, TurnError> {
        let _guard = self.locks.acquire(&thread_id).await;

        let state = match self.storage.load(&thread_id).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(
                    thread_id = %thread_id,
                    error = %e,
                    "Failed to load thread state; starting fresh and discarding history"
                );
                TurnState::new(&thread_id)
            }
        };
        let log_len = state.message_log.len();

        let learning_style = self.learning_style(student_id.as_deref()).await;
        let context =
            TurnContext::new(Arc::clone(&self.override_detector)).with_learning_style(learning_style);

        let report = match TurnExecutor::new(&self.gateway, &context, state)
            .run(message)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "Turn aborted, state not saved");
                return Err(e);
            }
        };

        report
            .state
            .check_invariants()
            .map_err(|e| TurnError::Internal(format!("refusing to save inconsistent state: {e}")))?;

        self.storage
            .save(&thread_id, &report.state)
            .await
            .map_err(TurnError::Store)?;

        tracing::info!(
            thread_id = %thread_id,
            intent = report.state.intent.map_or("-", Intent::as_str),
            handled_by = report.handled_by().map_or("-", Role::as_str),
            next_action = report.state.next_action.as_str(),
            log_len = report.state.message_log.len(),
            previous_log_len = log_len,
            "Turn saved"
        );

        self.record_turn(&report).await;
        if let Some(student_id) = student_id.as_deref() {
            let new_session = log_len == 0;
            if let Err(e) = self.storage.touch_student(student_id, new_session).await {
                tracing::warn!(student_id, error = %e, "Failed to update student activity");
            }
        }

        Ok(TurnOutcome::from_state(&report.state))
    }

    async fn learning_style(&self, student_id: Option<&str>) -> LearningStyle {
        let Some(student_id) = student_id else {
            return LearningStyle::default();
        };
        match self.storage.learning_style(student_id).await {
            Ok(style) => style.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(student_id, error = %e, "Failed to read student profile");
                LearningStyle::default()
            }
        }
    }

    async fn record_turn(&self, report: &TurnReport) {
        let mut turn = NewTurn::from_state(&report.state);
        turn.handled_by = report.handled_by().map(|role| role.as_str().to_string());
        // Answer turns skip classification; the thread's intent is stale there
        if !report.roles.contains(&Role::Classifier) {
            turn.intent = None;
        }
        if let Some(evaluation) = &report.evaluation {
            turn.score = Some(evaluation.score);
            turn.mastery_update.clone_from(&evaluation.mastery_update);
        }
        if let Err(e) = self.storage.record_turn(&turn).await {
            tracing::warn!(thread_id = %turn.thread_id, error = %e, "Failed to record turn");
        }
    }
}

// ============================================================================
// Per-thread serialisation
// ============================================================================

/// Keyed async locks, one per thread with a turn in flight
#[derive(Default)]
struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    async fn acquire(&self, thread_id: &str) -> ThreadGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(thread_id.to_string()).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        ThreadGuard {
            locks: self,
            thread_id: thread_id.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct ThreadGuard<'a> {
    locks: &'a ThreadLocks,
    thread_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this guard hold the lock: nobody is waiting
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.thread_id);
        }
    }
}
