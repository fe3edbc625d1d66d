//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use membership_service::auth::{AuthManager, RateLimitConfig, TokenIssuer};
use membership_service::config::ServerConfig;
use membership_service::database::SqliteDatabase;
use membership_service::membership::MembershipService;
use membership_service::server::{AppState, Server};
use serde_json::{json, Value};

/// Signing secret shared by test servers and hand-made tokens
pub const TEST_SECRET: &[u8] = b"integration-test-secret-with-32-bytes!";

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Create a token issuer using the shared test secret
pub fn create_test_issuer() -> Arc<TokenIssuer> {
    Arc::new(
        TokenIssuer::new(TEST_SECRET, Duration::from_secs(3600))
            .expect("Failed to create token issuer"),
    )
}

/// Create a test application state with the given throttle settings
pub async fn create_test_state_with_rate_limit(
    rate_limit: RateLimitConfig,
) -> AppState<SqliteDatabase> {
    let database = create_test_database().await;
    let tokens = create_test_issuer();

    AppState {
        membership: Arc::new(MembershipService::new(
            Arc::clone(&database),
            Arc::clone(&tokens),
            rate_limit,
        )),
        auth_manager: Arc::new(AuthManager::new(Arc::clone(&database), tokens)),
        database,
    }
}

/// Create a test application state
pub async fn create_test_state() -> AppState<SqliteDatabase> {
    create_test_state_with_rate_limit(RateLimitConfig::default()).await
}

/// Create a test server configuration with a random port
pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0, // Let OS assign a free port
    }
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState<SqliteDatabase>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let server = Server::new(create_test_server_config(), state);
    let listener = server.bind().await.expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    (addr, shutdown_tx)
}

/// Register a member and return the response status and JSON body
pub async fn register(
    client: &reqwest::Client,
    addr: SocketAddr,
    name: &str,
    email: &str,
    username: &str,
    password: &str,
) -> (reqwest::StatusCode, Value) {
    let response = client
        .post(format!("http://{}/register", addr))
        .json(&json!({
            "name": name,
            "email": email,
            "username": username,
            "password": password,
        }))
        .send()
        .await
        .expect("register request failed");

    let status = response.status();
    let body = response.json().await.expect("register body is not JSON");
    (status, body)
}

/// Log in and return the response status and JSON body
pub async fn login(
    client: &reqwest::Client,
    addr: SocketAddr,
    username: &str,
    password: &str,
) -> (reqwest::StatusCode, Value) {
    let response = client
        .post(format!("http://{}/login", addr))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("login request failed");

    let status = response.status();
    let body = response.json().await.expect("login body is not JSON");
    (status, body)
}

/// Register Ann and return the issued token
pub async fn register_ann(client: &reqwest::Client, addr: SocketAddr) -> String {
    let (status, body) = register(client, addr, "Ann", "ann@x.com", "ann", "pw1").await;
    assert_eq!(status, reqwest::StatusCode::CREATED);
    body["token"]
        .as_str()
        .expect("register response has no token")
        .to_string()
}
