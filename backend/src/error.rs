use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::{ConnectionId, ConnectionStatus};

/// Failure reported by a persistence backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Conflicting record already exists")]
    Conflict,

    #[error("Referenced record does not exist")]
    MissingReference,

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::MissingReference,
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification sink unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for NotifyError {
    fn from(err: sqlx::Error) -> Self {
        NotifyError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    AlreadyPending,
    AlreadyConnected,
}

impl fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPending => f.write_str("A connection request is already pending"),
            Self::AlreadyConnected => f.write_str("You are already connected"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("{0}")]
    DuplicateRequest(DuplicateKind),

    #[error("Connection {0} not found")]
    NotFound(ConnectionId),

    #[error("You are not allowed to perform this action on the connection")]
    Forbidden,

    #[error("Connection is {actual}, expected {expected}")]
    InvalidState {
        expected: ConnectionStatus,
        actual: ConnectionStatus,
    },

    #[error("Connection {id} could not be confirmed deleted after {attempts} attempts")]
    DeletionFailed { id: ConnectionId, attempts: u32 },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ConnectionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionError::DuplicateRequest(_) => "duplicate_request",
            ConnectionError::NotFound(_) => "not_found",
            ConnectionError::Forbidden => "forbidden",
            ConnectionError::InvalidState { .. } => "invalid_state",
            ConnectionError::DeletionFailed { .. } => "deletion_failed",
            ConnectionError::DependencyUnavailable(_) => "dependency_unavailable",
            ConnectionError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ConnectionError::DuplicateRequest(_) => StatusCode::CONFLICT,
            ConnectionError::NotFound(_) => StatusCode::NOT_FOUND,
            ConnectionError::Forbidden => StatusCode::FORBIDDEN,
            ConnectionError::InvalidState { .. } => StatusCode::CONFLICT,
            ConnectionError::DeletionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ConnectionError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConnectionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<StoreError> for ConnectionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingReference => {
                ConnectionError::InvalidRequest("referenced user does not exist".to_string())
            }
            other => ConnectionError::DependencyUnavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl IntoResponse for ConnectionError {
    fn into_response(self) -> Response {
        if let ConnectionError::DependencyUnavailable(msg) = &self {
            tracing::error!("Dependency failure: {}", msg);
        }

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}
