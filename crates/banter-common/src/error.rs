//! Centralized error types for Banter.
//!
//! Two layers live here:
//! - [`StoreError`]: infrastructure failures from Redis/Postgres and corrupt records.
//!   These are never "not found"; a missing record is `Ok(None)` at the store level.
//! - [`BanterError`]: the HTTP-facing error, convertible straight into an API response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Failures of the external stores backing sessions and accounts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record could not be decoded. Never papered over with partial data.
    #[error("Corrupt record at '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the same operation later could succeed (outage, timeout, dropped link).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Redis(e) => {
                e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
            }
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            Self::Corrupt { .. } | Self::Serialize(_) => false,
        }
    }
}

/// Core application error type used by the HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum BanterError {
    // === Auth errors ===
    #[error("Incorrect username or password")]
    CredentialsIncorrect,

    #[error("Unauthorized")]
    Unauthorized,

    // === Resource errors ===
    #[error("Session not found")]
    SessionsNotFound,

    #[error("Account not found")]
    AccountsNotFound,

    #[error("{resource} already exists")]
    AlreadyExists { resource: &'static str },

    // === Validation errors ===
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // === Infrastructure errors ===
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for BanterError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(StoreError::Database(e))
    }
}

impl From<redis::RedisError> for BanterError {
    fn from(e: redis::RedisError) -> Self {
        Self::Store(StoreError::Redis(e))
    }
}

/// JSON error envelope sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: &'static str,
    message: String,
}

impl BanterError {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CredentialsIncorrect | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::SessionsNotFound | Self::AccountsNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Store(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CredentialsIncorrect => "credentials.incorrect_credentials",
            Self::Unauthorized => "unauthorized",
            Self::SessionsNotFound => "sessions.not_found",
            Self::AccountsNotFound => "accounts.not_found",
            Self::AlreadyExists { resource: "Username" } => "accounts.username_exists",
            Self::AlreadyExists { resource: "Email address" } => "accounts.email_address_exists",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Validation { .. } => "validation.failed",
            Self::Store(e) if e.is_retryable() => "service.unavailable",
            Self::Store(_) | Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for BanterError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match &self {
            BanterError::Store(e) => {
                tracing::error!(retryable = e.is_retryable(), "Store error: {e}");
                "An internal error occurred".to_string()
            }
            BanterError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            status: "error",
            error: self.error_code(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using BanterError.
pub type BanterResult<T> = Result<T, BanterError>;
