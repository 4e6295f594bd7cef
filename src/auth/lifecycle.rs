//! Token lifecycle management
//!
//! `TokenLifecycle` issues, looks up, revokes and expires opaque tokens on top
//! of a `TokenStore`. Expiry is lazy: a token whose lifetime has run out is
//! moved to `Expired` when a lookup observes it, not by a background sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::token::{generate_token_id, generate_token_value};
use crate::database::{with_deadline, TokenStore};
use crate::error::{DbError, TokenError};
use crate::models::{mask_value, Token, TokenStatus};

/// Number of values tried before issuance gives up on collisions
const ISSUE_ATTEMPTS: usize = 3;

/// Configuration for the token lifecycle
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Deadline applied to every store call
    pub store_timeout: Duration,

    /// Largest token value length accepted by `issue`
    pub max_length: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(2),
            max_length: 256,
        }
    }
}

/// Token lifecycle manager
pub struct TokenLifecycle<S: TokenStore> {
    store: Arc<S>,
    config: LifecycleConfig,
}

impl<S: TokenStore> TokenLifecycle<S> {
    /// Create a new lifecycle manager
    pub fn new(store: Arc<S>, config: LifecycleConfig) -> Self {
        Self { store, config }
    }

    /// Issue a new active token for `owner_id`
    ///
    /// Returns the raw token value. The value is `length` alphanumeric
    /// characters and the token expires `ttl_seconds` after issuance.
    pub async fn issue(
        &self,
        owner_id: i64,
        length: usize,
        ttl_seconds: i64,
    ) -> Result<String, TokenError> {
        if length == 0 {
            return Err(TokenError::InvalidArgument(
                "length must be positive".to_string(),
            ));
        }
        if length > self.config.max_length {
            return Err(TokenError::InvalidArgument(format!(
                "length must not exceed {}",
                self.config.max_length
            )));
        }
        if ttl_seconds <= 0 {
            return Err(TokenError::InvalidArgument(
                "ttl_seconds must be positive".to_string(),
            ));
        }
        let ttl = chrono::Duration::try_seconds(ttl_seconds)
            .ok_or_else(|| TokenError::InvalidArgument("ttl_seconds is too large".to_string()))?;

        for attempt in 1..=ISSUE_ATTEMPTS {
            let token = Token::new(
                generate_token_id(),
                generate_token_value(length),
                owner_id,
                Utc::now(),
                ttl,
            )
            .ok_or_else(|| TokenError::InvalidArgument("ttl_seconds is too large".to_string()))?;

            match self.store_call(self.store.create_token(&token)).await {
                Ok(()) => {
                    tracing::info!(
                        token_id = %token.id,
                        owner_id,
                        expires_at = %token.expires_at,
                        "Token issued"
                    );
                    return Ok(token.value);
                }
                Err(DbError::DuplicateValue) => {
                    tracing::warn!(attempt, "Token value collision, regenerating");
                }
                Err(e) => {
                    tracing::error!(owner_id, error = %e, "Failed to persist token");
                    return Err(TokenError::Persistence(e));
                }
            }
        }

        tracing::error!(owner_id, attempts = ISSUE_ATTEMPTS, "Could not find a free token value");
        Err(TokenError::Persistence(DbError::DuplicateValue))
    }

    /// List every token regardless of status
    pub async fn list_all(&self) -> Result<Vec<Token>, TokenError> {
        self.store_call(self.store.list_tokens())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list tokens");
                TokenError::Persistence(e)
            })
    }

    /// Get a token by value as stored, without evaluating its expiry
    pub async fn lookup(&self, value: &str) -> Result<Token, TokenError> {
        self.store_call(self.store.get_token_by_value(value))
            .await?
            .ok_or(TokenError::NotFound)
    }

    /// Revoke an active token
    ///
    /// Revoking an already revoked token succeeds without change; revoking
    /// an expired token is rejected.
    pub async fn revoke(&self, value: &str) -> Result<(), TokenError> {
        let prior = self.store_call(self.store.revoke_token(value)).await?;

        match prior {
            TokenStatus::Active => {
                tracing::info!(value_hint = %mask_value(value), "Token revoked");
                Ok(())
            }
            TokenStatus::Revoked => Ok(()),
            TokenStatus::Expired => Err(TokenError::InvalidState {
                status: TokenStatus::Expired,
                action: "revoke",
            }),
        }
    }

    /// Move a token to `Expired`
    ///
    /// No write happens when `token` already reads `Expired`. Expiry time is
    /// not checked, so this also serves administrative expiry.
    pub async fn mark_expired(&self, token: &Token) -> Result<(), TokenError> {
        match token.status {
            TokenStatus::Expired => return Ok(()),
            TokenStatus::Revoked => return Err(expire_revoked()),
            TokenStatus::Active => {}
        }

        let prior = self
            .store_call(self.store.mark_token_expired(&token.value))
            .await?;

        match prior {
            TokenStatus::Active => {
                tracing::info!(token_id = %token.id, owner_id = token.owner_id, "Token expired");
                Ok(())
            }
            TokenStatus::Expired => Ok(()),
            TokenStatus::Revoked => Err(expire_revoked()),
        }
    }

    /// Look up a token and apply lazy expiry
    ///
    /// A token still reading `Active` past its expiry time is moved to
    /// `Expired` before it is returned.
    pub async fn lookup_current(&self, value: &str) -> Result<Token, TokenError> {
        let mut token = self.lookup(value).await?;

        if token.is_lapsed_at(Utc::now()) {
            match self.mark_expired(&token).await {
                Ok(()) => token.status = TokenStatus::Expired,
                // Lost a race with a concurrent transition
                Err(TokenError::InvalidState { status, .. }) => token.status = status,
                Err(e) => return Err(e),
            }
        }

        Ok(token)
    }

    /// Look up a token and require it to be usable
    pub async fn validate(&self, value: &str) -> Result<Token, TokenError> {
        let token = self.lookup_current(value).await?;

        if token.status != TokenStatus::Active {
            return Err(TokenError::InvalidState {
                status: token.status,
                action: "use",
            });
        }

        Ok(token)
    }

    async fn store_call<T, F>(&self, call: F) -> Result<T, DbError>
    where
        F: std::future::Future<Output = Result<T, DbError>>,
    {
        with_deadline(self.config.store_timeout, call).await
    }
}

fn expire_revoked() -> TokenError {
    TokenError::InvalidState {
        status: TokenStatus::Revoked,
        action: "expire",
    }
}
