//! Application error types for membership-service
//!
//! This module defines the error taxonomy shared by the hasher, the token
//! issuer, the member directory and the HTTP layer.
//! All error types use `thiserror` for ergonomic error handling.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Credential hashing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HashError {
    /// Hashing failed (entropy or resource failure)
    #[error("Hash failed: {0}")]
    HashFailed(String),

    /// Stored hash could not be parsed
    #[error("Malformed password hash")]
    MalformedHash,

    /// Plaintext exceeds the accepted maximum length
    #[error("Password exceeds {0} bytes")]
    InputTooLong(usize),
}

/// Session token errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    /// No token was presented
    #[error("Token missing")]
    Missing,

    /// Token could not be decoded
    #[error("Token malformed")]
    Malformed,

    /// Signature or algorithm mismatch
    #[error("Token signature invalid")]
    InvalidSignature,

    /// Token is past its expiry
    #[error("Token expired")]
    Expired,

    /// Token could not be signed
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    /// Configured token lifetime is zero or too long
    #[error("Token lifetime must be between 1 and {max} seconds, got {got}")]
    InvalidLifetime { got: u64, max: u64 },
}

/// Authentication-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// Bearer token missing or rejected
    #[error("Invalid token: {0}")]
    Token(#[from] TokenError),

    /// Token was valid but its member no longer exists
    #[error("Member not found for token subject")]
    MemberNotFound,

    /// Unknown username or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Rate limited due to too many failed attempts
    #[error("Rate limited: too many failed attempts, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Member directory could not be consulted
    #[error("Member directory unavailable: {0}")]
    Directory(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Username unique constraint
    #[error("Username already exists")]
    DuplicateUsername,

    /// Email unique constraint
    #[error("Email already exists")]
    DuplicateEmail,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Application-level error type
///
/// This is the error returned by the membership service and the HTTP
/// handlers. Its `IntoResponse` impl is the only place errors become status
/// codes and bodies.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Username already taken
    #[error("Username already exists")]
    DuplicateUsername,

    /// Email already taken
    #[error("Email already exists")]
    DuplicateEmail,

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Member does not exist
    #[error("Member not found")]
    NotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(DbError),

    /// Hashing subsystem error
    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AppError::NotFound,
            DbError::DuplicateUsername => AppError::DuplicateUsername,
            DbError::DuplicateEmail => AppError::DuplicateEmail,
            other => AppError::Database(other),
        }
    }
}

impl AppError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateUsername | AppError::DuplicateEmail => {
                StatusCode::BAD_REQUEST
            }
            AppError::Auth(AuthError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Auth(AuthError::Directory(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::Hash(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to a client
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::DuplicateUsername => "Username already exists".to_string(),
            AppError::DuplicateEmail => "Email already exists".to_string(),
            AppError::Auth(AuthError::InvalidCredentials) => "Invalid credentials".to_string(),
            AppError::Auth(AuthError::RateLimited { .. }) => {
                "Too many failed attempts. Please try again later.".to_string()
            }
            AppError::Auth(AuthError::Directory(_)) => "Internal server error".to_string(),
            AppError::Auth(_) => "Unauthorized".to_string(),
            AppError::NotFound => "Member not found".to_string(),
            AppError::Database(_)
            | AppError::Hash(_)
            | AppError::Config(_)
            | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let retry_after = match &self {
            AppError::Auth(AuthError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        };

        let mut response = (
            status,
            Json(serde_json::json!({ "error": self.public_message() })),
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}
