//! SQLite implementation of the store traits
//!
//! This module provides a SQLite-based implementation of `UserDirectory` and
//! `TokenStore` using rusqlite and tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{ErrorCode, OptionalExtension, TransactionBehavior};
use tokio_rusqlite::Connection;

use super::migrations::{migration_version, CREATE_SCHEMA};
use super::{TokenStore, UserDirectory};
use crate::error::DbError;
use crate::models::{Token, TokenStatus, User};

const TOKEN_COLUMNS: &str = "id, value, owner_id, issued_at, expires_at, status";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        let found = conn
            .call(|conn| {
                let found: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
                if found != 0 && found != migration_version() {
                    return Ok(Some(found));
                }

                conn.execute_batch(CREATE_SCHEMA)?;
                conn.pragma_update(None, "user_version", migration_version())?;
                Ok(None)
            })
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        if let Some(found) = found {
            return Err(DbError::Migration(format!(
                "unsupported schema version {} (expected {})",
                found,
                migration_version()
            )));
        }

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }

    /// Create a user, or replace the password hash of an existing one
    ///
    /// Used to seed the bootstrap account at startup.
    pub async fn upsert_user(&self, username: &str, password_hash: &str) -> Result<User, DbError> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO users (username, password_hash) VALUES (?1, ?2)
                    ON CONFLICT(username) DO UPDATE SET password_hash = excluded.password_hash
                    "#,
                    rusqlite::params![username, password_hash],
                )?;

                let id: i64 = conn.query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    [&username],
                    |row| row.get(0),
                )?;

                Ok(User::new(id, username, password_hash))
            })
            .await
            .map_err(Into::into)
    }

    /// Apply a compare-and-set transition out of `Active`
    async fn transition_token(&self, value: &str, to: TokenStatus) -> Result<TokenStatus, DbError> {
        let value = value.to_string();

        let prior = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let prior = tx
                    .query_row(
                        "SELECT status FROM tokens WHERE value = ?1",
                        [&value],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?
                    .map(|status| status.parse::<TokenStatus>());

                if let Some(Ok(status)) = &prior {
                    if !status.is_terminal() {
                        tx.execute(
                            "UPDATE tokens SET status = ?1 WHERE value = ?2 AND status = 'active'",
                            rusqlite::params![to.as_str(), value],
                        )?;
                    }
                }

                tx.commit()?;
                Ok(prior)
            })
            .await?;

        match prior {
            Some(status) => status.map_err(DbError::Corrupt),
            None => Err(DbError::NotFound),
        }
    }
}

#[async_trait]
impl UserDirectory for SqliteDatabase {
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT id, username, password_hash FROM users WHERE username = ?1",
                        [&username],
                        |row| Ok(User::new(row.get(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
                    )
                    .optional()?;

                Ok(user)
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl TokenStore for SqliteDatabase {
    async fn create_token(&self, token: &Token) -> Result<(), DbError> {
        let id = token.id.clone();
        let value = token.value.clone();
        let owner_id = token.owner_id;
        let issued_at = to_micros(&token.issued_at);
        let expires_at = to_micros(&token.expires_at);
        let status = token.status.as_str();

        let outcome = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    r#"
                    INSERT INTO tokens (id, value, owner_id, issued_at, expires_at, status)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    rusqlite::params![id, value, owner_id, issued_at, expires_at, status],
                ))
            })
            .await?;

        match outcome {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, msg)) if is_value_collision(&e, msg.as_deref()) => {
                Err(DbError::DuplicateValue)
            }
            Err(rusqlite::Error::SqliteFailure(e, msg)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::ConstraintViolation(
                    msg.unwrap_or_else(|| "tokens constraint".to_string()),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_tokens(&self) -> Result<Vec<Token>, DbError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tokens ORDER BY issued_at, id",
                    TOKEN_COLUMNS
                ))?;

                let rows = stmt
                    .query_map([], TokenRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(rows)
            })
            .await?;

        rows.into_iter().map(TokenRow::into_token).collect()
    }

    async fn get_token_by_value(&self, value: &str) -> Result<Option<Token>, DbError> {
        let value = value.to_string();

        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!("SELECT {} FROM tokens WHERE value = ?1", TOKEN_COLUMNS),
                        [&value],
                        TokenRow::from_row,
                    )
                    .optional()?;

                Ok(row)
            })
            .await?;

        row.map(TokenRow::into_token).transpose()
    }

    async fn revoke_token(&self, value: &str) -> Result<TokenStatus, DbError> {
        self.transition_token(value, TokenStatus::Revoked).await
    }

    async fn mark_token_expired(&self, value: &str) -> Result<TokenStatus, DbError> {
        self.transition_token(value, TokenStatus::Expired).await
    }
}

/// Raw token columns, decoded outside the connection thread
struct TokenRow {
    id: String,
    value: String,
    owner_id: i64,
    issued_at: i64,
    expires_at: i64,
    status: String,
}

impl TokenRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            value: row.get(1)?,
            owner_id: row.get(2)?,
            issued_at: row.get(3)?,
            expires_at: row.get(4)?,
            status: row.get(5)?,
        })
    }

    fn into_token(self) -> Result<Token, DbError> {
        Ok(Token {
            issued_at: from_micros(self.issued_at)?,
            expires_at: from_micros(self.expires_at)?,
            status: self.status.parse().map_err(DbError::Corrupt)?,
            id: self.id,
            value: self.value,
            owner_id: self.owner_id,
        })
    }
}

/// Whether an insert failed only because the token value is already taken
fn is_value_collision(err: &rusqlite::ffi::Error, msg: Option<&str>) -> bool {
    err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        && msg.is_some_and(|m| m.contains("tokens.value"))
}

/// Stored form of a timestamp: unix microseconds
fn to_micros(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

/// Decode a stored unix-microsecond timestamp
fn from_micros(micros: i64) -> Result<DateTime<Utc>, DbError> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;

    DateTime::<Utc>::from_timestamp(secs, nanos)
        .ok_or_else(|| DbError::Corrupt(format!("timestamp out of range: {}", micros)))
}
