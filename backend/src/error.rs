//! Error type shared by the draw, reveal and registration services.
//!
//! Every variant carries a stable snake_case code that appears verbatim in
//! HTTP bodies as `{"error": code, "message"?: ...}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use santa_core::DerangementError;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Coarse classification used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed caller input.
    Input,
    NotFound,
    /// Expected states the caller can act on (already drawn, already revealed).
    Conflict,
    /// The participant store failed.
    Dependency,
    /// Derangement generation ran out of attempts.
    Algorithmic,
    Internal,
    Unauthorized,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("token is required")]
    MissingToken,
    #[error("participant id is required")]
    MissingParticipantId,
    #[error("invalid token")]
    InvalidToken,
    #[error("game not found")]
    GameNotFound,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error("assignment not found")]
    AssignmentNotFound,
    #[error("receiver not found")]
    ReceiverNotFound,
    #[error("draw already done")]
    AlreadyDone,
    #[error("{name} already revealed their secret friend!")]
    AlreadyRevealed { name: String },
    #[error("need at least two participants, found {found}")]
    InsufficientParticipants { found: usize },
    #[error("expected {expected} participants, found {found}")]
    ParticipantCountMismatch { expected: usize, found: usize },
    #[error("derangement failed after {attempts} attempts")]
    AlgorithmicFailure { attempts: usize },
    #[error("failed to mark assignment revealed: {0}")]
    UpdateFailed(String),
    #[error("registration is closed, the draw already happened")]
    RegistrationClosed,
    #[error("name {0:?} is already registered")]
    NameTaken(String),
    #[error("{0}")]
    Validation(String),
    /// Request body was not the expected JSON document.
    #[error("{0}")]
    InvalidBody(String),
    #[error("invalid admin password")]
    Unauthorized,
    #[error("store error: {0}")]
    Dependency(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::MissingToken
            | CoreError::MissingParticipantId
            | CoreError::InsufficientParticipants { .. }
            | CoreError::ParticipantCountMismatch { .. }
            | CoreError::Validation(_)
            | CoreError::InvalidBody(_) => ErrorKind::Input,
            CoreError::InvalidToken
            | CoreError::GameNotFound
            | CoreError::ParticipantNotFound
            | CoreError::AssignmentNotFound
            | CoreError::ReceiverNotFound => ErrorKind::NotFound,
            CoreError::AlreadyDone
            | CoreError::AlreadyRevealed { .. }
            | CoreError::RegistrationClosed
            | CoreError::NameTaken(_) => ErrorKind::Conflict,
            CoreError::Dependency(_) | CoreError::UpdateFailed(_) => ErrorKind::Dependency,
            CoreError::AlgorithmicFailure { .. } => ErrorKind::Algorithmic,
            CoreError::Internal(_) => ErrorKind::Internal,
            CoreError::Unauthorized => ErrorKind::Unauthorized,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CoreError::MissingToken => "missing_token",
            CoreError::MissingParticipantId => "missing_participant_id",
            CoreError::InvalidToken => "invalid_token",
            CoreError::GameNotFound => "game_not_found",
            CoreError::ParticipantNotFound => "participant_not_found",
            CoreError::AssignmentNotFound => "assignment_not_found",
            CoreError::ReceiverNotFound => "receiver_not_found",
            CoreError::AlreadyDone => "draw_already_done",
            CoreError::AlreadyRevealed { .. } => "already_revealed",
            CoreError::InsufficientParticipants { .. } => "insufficient_participants",
            CoreError::ParticipantCountMismatch { .. } => "participant_count_mismatch",
            CoreError::AlgorithmicFailure { .. } => "derangement_failed",
            CoreError::UpdateFailed(_) => "update_failed",
            CoreError::RegistrationClosed => "registration_closed",
            CoreError::NameTaken(_) => "name_taken",
            CoreError::Validation(_) => "validation_error",
            CoreError::InvalidBody(_) => "invalid_body",
            CoreError::Unauthorized => "unauthorized",
            CoreError::Dependency(_) | CoreError::Internal(_) => "internal_error",
        }
    }

    /// Human-readable detail, only for codes that are not self-explanatory.
    pub fn message(&self) -> Option<String> {
        match self {
            CoreError::AlreadyRevealed { .. }
            | CoreError::InsufficientParticipants { .. }
            | CoreError::ParticipantCountMismatch { .. }
            | CoreError::AlgorithmicFailure { .. }
            | CoreError::UpdateFailed(_)
            | CoreError::NameTaken(_)
            | CoreError::Validation(_)
            | CoreError::InvalidBody(_)
            | CoreError::Dependency(_)
            | CoreError::Internal(_) => Some(self.to_string()),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Input => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Dependency | ErrorKind::Algorithmic | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<DerangementError> for CoreError {
    fn from(err: DerangementError) -> Self {
        match err {
            DerangementError::DegenerateInput(found) => {
                CoreError::InsufficientParticipants { found }
            }
            DerangementError::AlgorithmicFailure(attempts) => {
                CoreError::AlgorithmicFailure { attempts }
            }
        }
    }
}

impl From<JsonRejection> for CoreError {
    fn from(rejection: JsonRejection) -> Self {
        CoreError::InvalidBody(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}
