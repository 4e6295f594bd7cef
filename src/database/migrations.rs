//! Database migrations for token-gate
//!
//! This module contains SQL migrations for the SQLite database schema.

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
-- User accounts (managed outside the gate, read by it)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Opaque tokens; rows are never deleted so values are never reused.
-- Timestamps are unix microseconds.
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    value TEXT NOT NULL UNIQUE,
    owner_id INTEGER NOT NULL,
    issued_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'expired', 'revoked')),
    CHECK (expires_at > issued_at)
);

CREATE INDEX IF NOT EXISTS idx_tokens_owner ON tokens(owner_id);
CREATE INDEX IF NOT EXISTS idx_tokens_status ON tokens(status);
"#;

/// Schema version recorded in `PRAGMA user_version`
pub fn migration_version() -> i32 {
    1
}
