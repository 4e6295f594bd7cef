//! Token-related domain models
//!
//! This module defines the opaque token record, its status machine and the
//! request/response shapes used by the token API.

use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Number of leading characters of a token value shown in listings
const VALUE_HINT_CHARS: usize = 4;

/// Sub-second digits kept on token timestamps; the stores persist microseconds
const TIMESTAMP_PRECISION: u16 = 6;

/// Mask a raw token value down to a short prefix safe for logs and listings
pub fn mask_value(value: &str) -> String {
    let prefix: String = value.chars().take(VALUE_HINT_CHARS).collect();
    format!("{}...", prefix)
}

/// Lifecycle status of a token
///
/// `Active` may move to `Expired` or `Revoked`; both of those are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Active,
    Expired,
    Revoked,
}

impl TokenStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Expired => "expired",
            TokenStatus::Revoked => "revoked",
        }
    }

    /// Whether no further transition is allowed from this status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TokenStatus::Active)
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TokenStatus::Active),
            "expired" => Ok(TokenStatus::Expired),
            "revoked" => Ok(TokenStatus::Revoked),
            other => Err(format!("unknown token status '{}'", other)),
        }
    }
}

/// Opaque token stored in database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Unique token ID
    pub id: String,

    /// Opaque token value, unique across every token ever issued
    pub value: String,

    /// ID of the user the token was issued to
    pub owner_id: i64,

    /// When the token was issued
    pub issued_at: DateTime<Utc>,

    /// When the token stops being usable
    pub expires_at: DateTime<Utc>,

    /// Current lifecycle status
    pub status: TokenStatus,
}

impl Token {
    /// Create a new active token expiring `ttl` after `issued_at`
    ///
    /// Timestamps are truncated to microseconds. Returns `None` when `ttl` is
    /// not positive or the expiry falls outside the representable range.
    pub fn new(
        id: impl Into<String>,
        value: impl Into<String>,
        owner_id: i64,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<Self> {
        let issued_at = issued_at.trunc_subsecs(TIMESTAMP_PRECISION);
        let expires_at = issued_at
            .checked_add_signed(ttl)?
            .trunc_subsecs(TIMESTAMP_PRECISION);
        if expires_at <= issued_at {
            return None;
        }

        Some(Self {
            id: id.into(),
            value: value.into(),
            owner_id,
            issued_at,
            expires_at,
            status: TokenStatus::Active,
        })
    }

    /// Check whether the token still reads `Active` but its lifetime has run out
    ///
    /// Such a token must be moved to `Expired` before it is reported as invalid.
    pub fn is_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TokenStatus::Active && self.expires_at <= now
    }

    /// Short prefix of the value, safe to show in listings
    pub fn value_hint(&self) -> String {
        mask_value(&self.value)
    }
}

/// Token as exposed by the API (value masked)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub id: String,
    pub value_hint: String,
    pub owner_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: TokenStatus,
}

impl From<&Token> for TokenSummary {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id.clone(),
            value_hint: token.value_hint(),
            owner_id: token.owner_id,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
            status: token.status,
        }
    }
}

/// Request to issue a new token
///
/// Missing fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTokenRequest {
    /// Number of characters in the token value
    pub length: Option<usize>,

    /// Lifetime of the token in seconds
    pub ttl_seconds: Option<i64>,
}

/// Response when a token is issued (includes the raw token value)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Raw token value
    pub value: String,

    /// When the token expires
    pub expires_at: DateTime<Utc>,
}
