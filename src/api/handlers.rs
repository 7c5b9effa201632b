//! HTTP request handlers

use super::types::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, StudentRequest, StudentResponse,
    ThreadSnapshot, TurnListResponse,
};
use super::AppState;
use crate::db::DbError;
use crate::runtime::{TurnError, TurnRequest};
use crate::state_machine::state::LearningStyle;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/threads/:id", get(get_thread))
        .route("/threads/:id/turns", get(list_turns))
        .route("/students/:id", get(get_student).put(put_student))
        .with_state(state)
}

// ============================================================
// Health
// ============================================================

async fn root() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "StudyBuddy API is running",
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "All systems operational",
    })
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let outcome = state
        .runner
        .handle_turn(TurnRequest {
            message: req.message,
            thread_id: req.thread_id,
            student_id: req.student_id,
        })
        .await?;

    Ok(Json(outcome.into()))
}

// ============================================================
// Threads
// ============================================================

async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadSnapshot>, AppError> {
    let record = state.db.get_thread(&id)?;
    Ok(Json(record.into()))
}

async fn list_turns(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TurnListResponse>, AppError> {
    state.db.get_thread(&id)?;
    let turns = state.db.turns_for_thread(&id)?;
    Ok(Json(TurnListResponse { turns }))
}

// ============================================================
// Students
// ============================================================

async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudentResponse>, AppError> {
    let student = state.db.get_student(&id)?;
    Ok(Json(StudentResponse { student }))
}

async fn put_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StudentRequest>,
) -> Result<Json<StudentResponse>, AppError> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest("student id must not be empty".to_string()));
    }
    let learning_style = match req.learning_style.as_deref() {
        Some(raw) => raw
            .parse::<LearningStyle>()
            .map_err(AppError::BadRequest)?,
        None => LearningStyle::default(),
    };
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    let student = state.db.upsert_student(&id, name, learning_style)?;
    tracing::info!(student_id = %id, learning_style = learning_style.as_str(), "Student saved");
    Ok(Json(StudentResponse { student }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::Validation(msg) => AppError::BadRequest(msg),
            TurnError::Role(failure) => {
                tracing::error!(role = %failure.role, cause = %failure.cause, "Role failed");
                AppError::BadGateway(
                    "The tutor is temporarily unavailable. Please try again.".to_string(),
                )
            }
            other => {
                tracing::error!(error = %other, "Turn failed");
                AppError::Internal("Error processing request".to_string())
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ThreadNotFound(_) | DbError::StudentNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            other => {
                tracing::error!(error = %other, "Database request failed");
                AppError::Internal("Database error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
