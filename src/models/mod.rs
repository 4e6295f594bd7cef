//! Domain models for token-gate
//!
//! This module contains the core domain models used throughout the application.

pub mod token;
pub mod user;

// Re-export commonly used types
pub use token::{mask_value, IssueTokenRequest, IssuedToken, Token, TokenStatus, TokenSummary};
pub use user::User;
