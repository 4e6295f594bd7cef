//! Application assembly
//!
//! Opens the store, seeds the bootstrap account and wires the gate and the
//! token lifecycle into the HTTP state. Every collaborator is passed in
//! explicitly.

use std::sync::Arc;

use crate::auth::{hash_password, AuthGate, LifecycleConfig, TokenLifecycle};
use crate::config::Config;
use crate::database::SqliteDatabase;
use crate::error::AppError;
use crate::server::{AppState, GateState, TokenDefaults};

/// Build the application state from configuration
pub async fn build_state(config: &Config) -> Result<AppState<SqliteDatabase>, AppError> {
    config
        .validate()
        .map_err(|e| AppError::Config(e.to_string()))?;

    let database = Arc::new(SqliteDatabase::new(&config.database.path).await?);
    tracing::info!(path = %config.database.path, "Database initialized");

    if let Some(password) = &config.auth.admin_password {
        let hash = hash_password(password).map_err(|e| AppError::Internal(e.to_string()))?;
        let user = database
            .upsert_user(&config.auth.admin_username, &hash)
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, "Bootstrap account seeded");
    }

    let gate = AuthGate::new(Arc::clone(&database)).with_lookup_timeout(config.database.timeout());
    let tokens = TokenLifecycle::new(
        database,
        LifecycleConfig {
            store_timeout: config.database.timeout(),
            max_length: config.tokens.max_length,
        },
    );

    Ok(AppState {
        gate: GateState::new(Arc::new(gate), config.auth.realm.clone()),
        tokens: Arc::new(tokens),
        token_defaults: TokenDefaults {
            length: config.tokens.default_length,
            ttl_secs: config.tokens.default_ttl_secs,
        },
    })
}
