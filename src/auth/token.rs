//! Token value generation and password hashing
//!
//! Token values are opaque alphanumeric strings drawn from the OS random
//! source. Passwords are stored as Argon2id PHC strings.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Length of a token ID in random bytes
const TOKEN_ID_BYTES: usize = 16;

/// Generate an opaque token value of exactly `length` characters
///
/// Each character is drawn uniformly from `[A-Za-z0-9]`.
///
/// # Example
///
/// ```
/// use token_gate::auth::token::generate_token_value;
///
/// let value = generate_token_value(32);
/// assert_eq!(value.len(), 32);
/// assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_token_value(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a unique token ID (16 random bytes, URL-safe Base64)
pub fn generate_token_id() -> String {
    let mut id_bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.fill_bytes(&mut id_bytes);
    URL_SAFE_NO_PAD.encode(id_bytes)
}

/// Hash a password using Argon2id
///
/// The hash includes a random salt, so hashing the same password twice
/// yields different strings.
///
/// # Example
///
/// ```
/// use token_gate::auth::token::hash_password;
///
/// let hash = hash_password("123456").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::HashFailed(e.to_string()))
}

/// Verify a password against a stored hash
///
/// Returns `Ok(false)` on a mismatch. A stored hash that cannot be parsed is
/// an error rather than a mismatch, because nothing can be concluded about
/// the supplied password.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, HashError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| HashError::InvalidHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Error type for password hashing operations
#[derive(Debug, Clone, PartialEq)]
pub enum HashError {
    /// Hashing failed
    HashFailed(String),

    /// Stored hash is not a valid PHC string
    InvalidHash(String),
}

impl std::fmt::Display for HashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashError::HashFailed(msg) => write!(f, "Hash failed: {}", msg),
            HashError::InvalidHash(msg) => write!(f, "Invalid hash: {}", msg),
        }
    }
}

impl std::error::Error for HashError {}
