//! HTTP Basic credential parsing

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::AuthError;

/// Username and password carried by an `Authorization: Basic` header
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse an `Authorization` header value
    ///
    /// The scheme name is matched case-insensitively. The payload must be
    /// standard Base64 of UTF-8 `username:password`; only the first `:` is a
    /// separator, so passwords may contain colons.
    pub fn from_header_value(header: &str) -> Result<Self, AuthError> {
        let (scheme, payload) = header
            .trim()
            .split_once(' ')
            .ok_or_else(|| AuthError::MalformedHeader("expected '<scheme> <credentials>'".to_string()))?;

        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthError::MalformedHeader(format!(
                "unsupported scheme '{}'",
                scheme
            )));
        }

        let decoded = STANDARD
            .decode(payload.trim())
            .map_err(|_| AuthError::MalformedHeader("invalid base64 payload".to_string()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::MalformedHeader("payload is not UTF-8".to_string()))?;

        let mut parts = decoded.splitn(2, ':');
        let username = parts.next().unwrap_or_default();
        let password = parts
            .next()
            .ok_or_else(|| AuthError::MalformedHeader("missing ':' separator".to_string()))?;

        if username.is_empty() {
            return Err(AuthError::MalformedHeader("empty username".to_string()));
        }

        Ok(Self::new(username, password))
    }

    /// Encode as an `Authorization` header value
    pub fn to_header_value(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", encoded)
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
