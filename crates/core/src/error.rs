// Central Error Types for the Portal

use thiserror::Error;

/// Failure of a call to a remote collaborator (Fermi batch service or ICAT).
///
/// Every network boundary returns this instead of a sentinel, so callers
/// decide exhaustively what an unavailable service means for them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Unreachable host, timeout or an unexpected HTTP status
    #[error("Remote service unavailable: {0}")]
    Connectivity(String),

    /// Missing or expired session cookie, rejected credentials
    #[error("Not authenticated: {0}")]
    Auth(String),

    /// Malformed JSON/XML or a payload missing expected fields
    #[error("Malformed remote payload: {0}")]
    Parse(String),

    /// The service answered with an `Err_Msg` instead of the expected result
    #[error("Remote service rejected the request: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth(_))
    }
}

/// Result of a remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database / AppError::Conflict
