//! Authentication system for token-gate
//!
//! This module provides:
//! - Basic credential parsing and verification
//! - Password hashing and token value generation
//! - The token lifecycle (issue, lookup, revoke, lazy expiry)

pub mod credentials;
pub mod gate;
pub mod lifecycle;
pub mod token;

pub use credentials::BasicCredentials;
pub use gate::{AuthGate, CredentialVerifier, Verification};
pub use lifecycle::{LifecycleConfig, TokenLifecycle};
pub use token::{generate_token_id, generate_token_value, hash_password, verify_password, HashError};
