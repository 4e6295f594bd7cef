//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};

use token_gate::app::build_state;
use token_gate::config::Config;
use token_gate::database::SqliteDatabase;
use token_gate::server::{AppState, Server};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "123456";

/// Configuration backed by an in-memory database with a seeded admin
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0; // Let OS assign a free port
    config.database.path = ":memory:".to_string();
    config.auth.admin_username = ADMIN_USERNAME.to_string();
    config.auth.admin_password = Some(ADMIN_PASSWORD.to_string());
    config
}

/// Create a test application state
pub async fn create_test_state(config: &Config) -> AppState<SqliteDatabase> {
    build_state(config)
        .await
        .expect("Failed to build test state")
}

/// `Authorization` header value for the given credentials
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

pub fn admin_auth() -> String {
    basic_auth(ADMIN_USERNAME, ADMIN_PASSWORD)
}

/// Run a test server in the background and return the base URL
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    config: Config,
) -> (String, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let state = create_test_state(&config).await;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let server = Server::new(config.server.clone(), state);
    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    // Give the server a moment to start (100ms is sufficient for slow CI systems)
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (format!("http://{}", addr), shutdown_tx)
}
