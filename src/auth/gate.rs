//! Basic credential verification
//!
//! `AuthGate` checks a username/password pair against the user directory.
//! A wrong password or unknown user is a normal negative answer
//! (`Verification::Mismatch`); an `AuthError` means the check itself could
//! not be completed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::token::verify_password;
use crate::database::{with_deadline, UserDirectory};
use crate::error::AuthError;
use crate::models::User;

/// Default deadline for user directory lookups
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a completed credential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Password verified for this user
    Matched(User),

    /// Password did not verify; carries the user when the username exists
    Mismatch(Option<User>),
}

/// Anything that can verify Basic credentials
///
/// The HTTP middleware depends on this trait rather than on `AuthGate`
/// directly.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_basic_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Verification, AuthError>;
}

/// Verifies Basic credentials against a `UserDirectory`
pub struct AuthGate<U: UserDirectory> {
    users: Arc<U>,
    lookup_timeout: Duration,
}

impl<U: UserDirectory> AuthGate<U> {
    /// Create a new gate over the given directory
    pub fn new(users: Arc<U>) -> Self {
        Self {
            users,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Bound every directory lookup by `timeout`
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }
}

#[async_trait]
impl<U: UserDirectory> CredentialVerifier for AuthGate<U> {
    async fn verify_basic_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Verification, AuthError> {
        let user = with_deadline(
            self.lookup_timeout,
            self.users.get_user_by_username(username),
        )
        .await?;

        let Some(user) = user else {
            return Ok(Verification::Mismatch(None));
        };

        let matched = verify_password(password, &user.password_hash)
            .map_err(|e| AuthError::CredentialDecode(e.to_string()))?;

        if matched {
            Ok(Verification::Matched(user))
        } else {
            Ok(Verification::Mismatch(Some(user)))
        }
    }
}
