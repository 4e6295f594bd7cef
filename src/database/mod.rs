//! Database layer for token-gate
//!
//! This module defines the store traits consumed by the gate and the token
//! lifecycle, together with a SQLite and an in-memory implementation.

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryDatabase;
pub use sqlite::SqliteDatabase;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{Token, TokenStatus, User};

/// Read access to user credentials
///
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Get a user by exact username
    ///
    /// Returns None when no such user exists.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError>;
}

/// Durable storage for token records
///
/// Status transitions are compare-and-set operations: the store moves a token
/// out of `Active` atomically and reports the status it observed before the
/// write. A token already in a terminal state is left untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a newly issued token
    ///
    /// Fails with `DbError::DuplicateValue` if the value is already taken.
    /// Any other constraint failure is a `DbError::ConstraintViolation`.
    async fn create_token(&self, token: &Token) -> Result<(), DbError>;

    /// List every token regardless of status
    async fn list_tokens(&self) -> Result<Vec<Token>, DbError>;

    /// Get a token by its value
    async fn get_token_by_value(&self, value: &str) -> Result<Option<Token>, DbError>;

    /// Move an active token to `Revoked`
    ///
    /// Returns the prior status, or `DbError::NotFound`.
    async fn revoke_token(&self, value: &str) -> Result<TokenStatus, DbError>;

    /// Move an active token to `Expired`
    ///
    /// Returns the prior status, or `DbError::NotFound`.
    async fn mark_token_expired(&self, value: &str) -> Result<TokenStatus, DbError>;
}

/// Run a store call, failing with `DbError::Timeout` once `deadline` elapses
///
/// The inner future is dropped on timeout, which cancels the pending call.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, DbError>
where
    F: Future<Output = Result<T, DbError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(DbError::Timeout(deadline)),
    }
}
