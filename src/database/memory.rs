//! In-memory store used for tests and ephemeral deployments

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{TokenStore, UserDirectory};
use crate::error::DbError;
use crate::models::{Token, TokenStatus, User};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    /// Tokens keyed by value, plus insertion order for stable listing
    tokens: HashMap<String, Token>,
    order: Vec<String>,
}

/// In-memory implementation of `UserDirectory` and `TokenStore`
///
/// Can be switched into an unavailable state to exercise backend failures.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user
    pub fn insert_user(&self, user: User) -> Result<(), DbError> {
        let mut tables = self.write()?;
        tables.users.insert(user.username.clone(), user);
        Ok(())
    }

    /// Make every subsequent call fail with `DbError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DbError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, DbError> {
        self.tables
            .read()
            .map_err(|_| DbError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, DbError> {
        self.tables
            .write()
            .map_err(|_| DbError::Unavailable("lock poisoned".to_string()))
    }

    fn transition_token(&self, value: &str, to: TokenStatus) -> Result<TokenStatus, DbError> {
        self.check_available()?;
        let mut tables = self.write()?;

        let token = tables.tokens.get_mut(value).ok_or(DbError::NotFound)?;
        let prior = token.status;
        if !prior.is_terminal() {
            token.status = to;
        }
        Ok(prior)
    }
}

#[async_trait]
impl UserDirectory for MemoryDatabase {
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        self.check_available()?;
        Ok(self.read()?.users.get(username).cloned())
    }
}

#[async_trait]
impl TokenStore for MemoryDatabase {
    async fn create_token(&self, token: &Token) -> Result<(), DbError> {
        self.check_available()?;
        let mut tables = self.write()?;

        if tables.tokens.contains_key(&token.value) {
            return Err(DbError::DuplicateValue);
        }
        if tables.tokens.values().any(|t| t.id == token.id) {
            return Err(DbError::ConstraintViolation(
                "UNIQUE constraint failed: tokens.id".to_string(),
            ));
        }

        tables.order.push(token.value.clone());
        tables.tokens.insert(token.value.clone(), token.clone());
        Ok(())
    }

    async fn list_tokens(&self) -> Result<Vec<Token>, DbError> {
        self.check_available()?;
        let tables = self.read()?;

        Ok(tables
            .order
            .iter()
            .filter_map(|value| tables.tokens.get(value).cloned())
            .collect())
    }

    async fn get_token_by_value(&self, value: &str) -> Result<Option<Token>, DbError> {
        self.check_available()?;
        Ok(self.read()?.tokens.get(value).cloned())
    }

    async fn revoke_token(&self, value: &str) -> Result<TokenStatus, DbError> {
        self.transition_token(value, TokenStatus::Revoked)
    }

    async fn mark_token_expired(&self, value: &str) -> Result<TokenStatus, DbError> {
        self.transition_token(value, TokenStatus::Expired)
    }
}
