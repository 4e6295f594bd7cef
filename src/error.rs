//! Application error types for token-gate
//!
//! This module defines the error taxonomy shared by the authentication gate,
//! the token lifecycle and the stores underneath them.
//! All error types use `thiserror` for ergonomic error handling.

use std::time::Duration;

use thiserror::Error;

use crate::models::TokenStatus;

/// Errors raised while verifying Basic credentials
///
/// A credential mismatch is NOT represented here: it is a normal negative
/// result (`Verification::Mismatch`). Everything in this enum means the
/// verification itself could not be carried out.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No Authorization header, or no credentials in the request scratch context
    #[error("Missing authorization credentials")]
    MissingAuth,

    /// Authorization header present but not a well-formed Basic credential
    #[error("Malformed authorization header: {0}")]
    MalformedHeader(String),

    /// The stored credential verifier could not be decoded
    #[error("Stored credential could not be decoded: {0}")]
    CredentialDecode(String),

    /// The user directory failed
    #[error("User directory error: {0}")]
    Directory(#[from] DbError),
}

/// Errors raised by the token lifecycle
#[derive(Debug, Error)]
pub enum TokenError {
    /// Structurally invalid request (non-positive length or ttl)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No token with the given value exists
    #[error("Token not found")]
    NotFound,

    /// The token is in a terminal state incompatible with the operation
    #[error("Cannot {action} a token that is {status}")]
    InvalidState {
        status: TokenStatus,
        action: &'static str,
    },

    /// The backing store failed
    #[error("Persistence error: {0}")]
    Persistence(DbError),
}

impl From<DbError> for TokenError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => TokenError::NotFound,
            other => TokenError::Persistence(other),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection thread error
    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// A token with the same value already exists
    #[error("Duplicate token value")]
    DuplicateValue,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The store did not answer before the deadline
    #[error("Store deadline of {0:?} elapsed")]
    Timeout(Duration),

    /// The store cannot currently serve requests
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Application-level error type
///
/// Errors raised while assembling the application at startup.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(
            AuthError::MissingAuth.to_string(),
            "Missing authorization credentials"
        );
        assert_eq!(
            AuthError::MalformedHeader("not base64".to_string()).to_string(),
            "Malformed authorization header: not base64"
        );
        assert_eq!(
            AuthError::Directory(DbError::Unavailable("down".to_string())).to_string(),
            "User directory error: Store unavailable: down"
        );
    }

    #[test]
    fn test_token_error_messages() {
        assert_eq!(TokenError::NotFound.to_string(), "Token not found");
        assert_eq!(
            TokenError::InvalidState {
                status: TokenStatus::Expired,
                action: "revoke",
            }
            .to_string(),
            "Cannot revoke a token that is expired"
        );
        assert_eq!(
            TokenError::InvalidArgument("length must be positive".to_string()).to_string(),
            "Invalid argument: length must be positive"
        );
    }

    #[test]
    fn test_token_error_from_db_not_found() {
        let err: TokenError = DbError::NotFound.into();
        assert!(matches!(err, TokenError::NotFound));
    }

    #[test]
    fn test_token_error_from_db_failure_is_persistence() {
        let err: TokenError = DbError::Timeout(Duration::from_millis(50)).into();
        assert!(matches!(err, TokenError::Persistence(DbError::Timeout(_))));
    }

    #[test]
    fn test_app_error_display() {
        let app_err: AppError = DbError::NotFound.into();
        assert_eq!(app_err.to_string(), "Database error: Record not found");

        let app_err = AppError::Config("missing field".to_string());
        assert_eq!(app_err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_db_error_from_sqlite() {
        let sqlite_err = rusqlite::Error::InvalidParameterName("test".to_string());
        let db_err: DbError = sqlite_err.into();

        match db_err {
            DbError::Sqlite(_) => (),
            _ => panic!("Expected DbError::Sqlite"),
        }
    }

    #[test]
    fn test_db_error_messages() {
        assert_eq!(DbError::NotFound.to_string(), "Record not found");
        assert_eq!(
            DbError::ConstraintViolation("unique".to_string()).to_string(),
            "Constraint violation: unique"
        );
        assert_eq!(DbError::DuplicateValue.to_string(), "Duplicate token value");
        assert_eq!(
            DbError::Corrupt("bad status".to_string()).to_string(),
            "Corrupt record: bad status"
        );
    }
}
