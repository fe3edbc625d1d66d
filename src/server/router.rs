//! HTTP router for membership-service
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Registration and login
//! - Bearer-protected member CRUD

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        ConnectInfo, Path, State,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::middleware::{
    auth_middleware, logging_middleware, tracing_middleware, AuthenticatedMember,
};
use crate::auth::AuthManager;
use crate::database::MemberDirectory;
use crate::error::AppError;
use crate::membership::MembershipService;
use crate::models::{
    LoginRequest, LoginResponse, MemberProfile, MessageResponse, RegisterRequest,
    RegisterResponse, UpdateMemberRequest,
};

/// Shared application state
pub struct AppState<D: MemberDirectory> {
    /// Registration, login and member CRUD
    pub membership: Arc<MembershipService<D>>,

    /// Bearer token resolution for protected routes
    pub auth_manager: Arc<AuthManager<D>>,

    /// Member directory, used directly by the health check
    pub database: Arc<D>,
}

impl<D: MemberDirectory> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            membership: Arc::clone(&self.membership),
            auth_manager: Arc::clone(&self.auth_manager),
            database: Arc::clone(&self.database),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

/// Build the main application router
///
/// `/health`, `/register` and `/login` are public; every other route goes
/// through `auth_middleware`.
pub fn build_router<D: MemberDirectory + 'static>(state: AppState<D>) -> Router {
    let protected = Router::new()
        .route("/members", get(list_members_handler::<D>))
        .route("/members/:id", get(get_member_handler::<D>))
        .route("/update/:id", put(update_member_handler::<D>))
        .route("/delete/:id", delete(delete_member_handler::<D>))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth_manager),
            auth_middleware::<D>,
        ));

    Router::new()
        .route("/health", get(health_handler::<D>))
        .route("/register", post(register_handler::<D>))
        .route("/login", post(login_handler::<D>))
        .merge(protected)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(tracing_middleware))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint handler
async fn health_handler<D: MemberDirectory + 'static>(
    State(state): State<AppState<D>>,
) -> impl IntoResponse {
    match state.database.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                database: "connected".to_string(),
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    database: "unreachable".to_string(),
                }),
            )
        }
    }
}

// =============================================================================
// Registration and login
// =============================================================================

async fn register_handler<D: MemberDirectory + 'static>(
    State(state): State<AppState<D>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body.map_err(invalid_body)?;

    let session = state.membership.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            member: MemberProfile::from(session.member),
            token: session.token.token,
            expires_at: session.token.expires_at,
        }),
    ))
}

async fn login_handler<D: MemberDirectory + 'static>(
    State(state): State<AppState<D>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = body.map_err(invalid_body)?;
    let client_ip = connect_info.map(|ConnectInfo(addr)| addr.ip());

    let session = state.membership.login(request, client_ip).await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token: session.token.token,
        expires_at: session.token.expires_at,
    }))
}

// =============================================================================
// Member CRUD (bearer protected)
// =============================================================================

async fn list_members_handler<D: MemberDirectory + 'static>(
    State(state): State<AppState<D>>,
) -> Result<Json<Vec<MemberProfile>>, AppError> {
    let members = state.membership.list_members().await?;
    Ok(Json(members.into_iter().map(MemberProfile::from).collect()))
}

async fn get_member_handler<D: MemberDirectory + 'static>(
    State(state): State<AppState<D>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MemberProfile>, AppError> {
    let Path(id) = id.map_err(invalid_id)?;
    let member = state.membership.get_member(id).await?;
    Ok(Json(MemberProfile::from(member)))
}

async fn update_member_handler<D: MemberDirectory + 'static>(
    State(state): State<AppState<D>>,
    Extension(AuthenticatedMember(actor)): Extension<AuthenticatedMember>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateMemberRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id.map_err(invalid_id)?;
    let Json(request) = body.map_err(invalid_body)?;

    state.membership.update_member(id, request).await?;
    tracing::info!(actor_id = actor.id, member_id = id, "Member record updated");

    Ok(Json(MessageResponse::new("Member updated successfully")))
}

async fn delete_member_handler<D: MemberDirectory + 'static>(
    State(state): State<AppState<D>>,
    Extension(AuthenticatedMember(actor)): Extension<AuthenticatedMember>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id.map_err(invalid_id)?;

    state.membership.delete_member(id).await?;
    tracing::info!(actor_id = actor.id, member_id = id, "Member record deleted");

    Ok(Json(MessageResponse::new("Member deleted successfully")))
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}

fn invalid_id(_: PathRejection) -> AppError {
    AppError::Validation("Invalid member id".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{RateLimitConfig, TokenIssuer};
    use crate::database::{MockMemberDirectory, SqliteDatabase};
    use crate::error::DbError;
    use axum::http::{header, HeaderValue};
    use axum_test::TestServer;
    use chrono::Utc;
    use std::time::Duration;

    const SECRET: &[u8] = b"test-secret-key-with-at-least-32-bytes";

    fn create_state<D: MemberDirectory + 'static>(db: D) -> (AppState<D>, Arc<TokenIssuer>) {
        let db = Arc::new(db);
        let tokens = Arc::new(TokenIssuer::new(SECRET, Duration::from_secs(3600)).unwrap());
        let membership = Arc::new(MembershipService::new(
            Arc::clone(&db),
            Arc::clone(&tokens),
            RateLimitConfig::default(),
        ));
        let auth_manager = Arc::new(AuthManager::new(Arc::clone(&db), Arc::clone(&tokens)));

        (
            AppState {
                membership,
                auth_manager,
                database: db,
            },
            tokens,
        )
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    async fn create_test_server() -> TestServer {
        let (state, _) = create_state(SqliteDatabase::in_memory().await.unwrap());
        TestServer::new(build_router(state)).unwrap()
    }

    async fn register_ann(server: &TestServer) -> RegisterResponse {
        let response = server
            .post("/register")
            .json(&RegisterRequest::new("Ann", "ann@x.com", "ann", "pw1"))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    // Test 1: Health endpoint reports a reachable database
    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let server = create_test_server().await;

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.database, "connected");
    }

    // Test 2: Health endpoint reports an unreachable database
    #[tokio::test]
    async fn test_health_endpoint_database_down() {
        let mut mock_db = MockMemberDirectory::new();
        mock_db
            .expect_ping()
            .returning(|| Err(DbError::Migration("closed".to_string())));
        let (state, _) = create_state(mock_db);
        let server = TestServer::new(build_router(state)).unwrap();

        let response = server.get("/health").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "unhealthy");
    }

    // Test 3: Register returns 201 with a profile and a token
    #[tokio::test]
    async fn test_register_created() {
        let server = create_test_server().await;

        let body = register_ann(&server).await;
        assert_eq!(body.member.username, "ann");
        assert!(!body.token.is_empty());
        assert!(body.expires_at > Utc::now());
    }

    // Test 4: Register response carries no password material
    #[tokio::test]
    async fn test_register_response_has_no_password() {
        let server = create_test_server().await;

        let response = server
            .post("/register")
            .json(&RegisterRequest::new("Ann", "ann@x.com", "ann", "pw1"))
            .await;
        let text = response.text();

        assert!(!text.contains("password"));
        assert!(!text.contains("argon2"));
        assert!(!text.contains("pw1"));
    }

    // Test 5: Missing fields and bad JSON are 400
    #[tokio::test]
    async fn test_register_bad_requests() {
        let server = create_test_server().await;

        let response = server
            .post("/register")
            .json(&serde_json::json!({"name": "Ann", "username": "ann"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/register")
            .json(&serde_json::json!({"name": 5, "email": [], "username": "ann", "password": "pw1"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());
    }

    // Test 6: Duplicate registration is 400
    #[tokio::test]
    async fn test_register_duplicate() {
        let server = create_test_server().await;
        register_ann(&server).await;

        let response = server
            .post("/register")
            .json(&RegisterRequest::new("Ann", "ann2@x.com", "ann", "pw1"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Username already exists");
    }

    // Test 7: Login success and failure
    #[tokio::test]
    async fn test_login() {
        let server = create_test_server().await;
        register_ann(&server).await;

        let response = server
            .post("/login")
            .json(&LoginRequest::new("ann", "pw1"))
            .await;
        response.assert_status_ok();
        let body: LoginResponse = response.json();
        assert_eq!(body.message, "Login successful");

        let response = server
            .post("/login")
            .json(&LoginRequest::new("ann", "wrong"))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/login")
            .json(&serde_json::json!({"username": "ann"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // Test 8: Protected routes need a token
    #[tokio::test]
    async fn test_members_requires_token() {
        let server = create_test_server().await;
        let registered = register_ann(&server).await;

        server
            .get("/members")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .get("/members")
            .add_header(header::AUTHORIZATION, bearer(&registered.token))
            .await;
        response.assert_status_ok();

        let members: Vec<MemberProfile> = response.json();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username, "ann");
    }

    // Test 9: Get, update and delete by id
    #[tokio::test]
    async fn test_member_crud() {
        let server = create_test_server().await;
        let registered = register_ann(&server).await;
        let id = registered.member.id;
        let token = registered.token;

        let response = server
            .get(&format!("/members/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();

        let response = server
            .put(&format!("/update/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({"name": "Annie"}))
            .await;
        response.assert_status_ok();
        let body: MessageResponse = response.json();
        assert_eq!(body.message, "Member updated successfully");

        let profile: MemberProfile = server
            .get(&format!("/members/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .json();
        assert_eq!(profile.name, "Annie");

        server
            .delete(&format!("/delete/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();
    }

    // Test 10: Unknown and malformed ids
    #[tokio::test]
    async fn test_member_bad_ids() {
        let server = create_test_server().await;
        let token = register_ann(&server).await.token;

        server
            .get("/members/999")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete("/delete/999")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .put("/update/999")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&serde_json::json!({"name": "X"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get("/members/abc")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    // Test 11: Unauthenticated requests to protected routes never touch the directory
    #[tokio::test]
    async fn test_rejected_request_skips_handler() {
        let mut mock_db = MockMemberDirectory::new();
        mock_db.expect_delete_member().never();
        mock_db.expect_list_members().never();
        let (state, _) = create_state(mock_db);
        let server = TestServer::new(build_router(state)).unwrap();

        server
            .delete("/delete/1")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/members")
            .add_header(header::AUTHORIZATION, bearer("garbage"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Test 12: Unknown route
    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let server = create_test_server().await;
        server
            .get("/nonexistent")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
