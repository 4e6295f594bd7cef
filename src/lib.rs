//! token-gate - HTTP Basic authentication gate with opaque token lifecycle management
//!
//! This crate provides middleware that verifies Basic credentials against a
//! user directory, and a manager that issues, revokes and lazily expires
//! opaque bearer tokens.

pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod server;
pub mod telemetry;
