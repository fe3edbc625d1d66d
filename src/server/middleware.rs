//! HTTP middleware for membership-service
//!
//! This module provides middleware for:
//! - Bearer token authentication of protected routes
//! - Request/response logging
//! - Per-request tracing spans

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthManager;
use crate::database::MemberDirectory;
use crate::error::AuthError;
use crate::models::Member;

/// Member resolved from the bearer token, available to protected handlers
#[derive(Clone, Debug)]
pub struct AuthenticatedMember(pub Member);

/// Authentication middleware function
///
/// This middleware:
/// 1. Extracts the Authorization header
/// 2. Verifies the bearer token and resolves its member
/// 3. Adds the member to the request extensions
///
/// It is installed with `route_layer` on the protected routes only.
pub async fn auth_middleware<D: MemberDirectory + 'static>(
    State(auth_manager): State<Arc<AuthManager<D>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthResponse> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let member = auth_manager
        .authenticate(auth_header)
        .await
        .map_err(AuthResponse::from_error)?;

    request
        .extensions_mut()
        .insert(AuthenticatedMember(member));

    Ok(next.run(request).await)
}

/// Authentication error response
///
/// Every token or subject failure produces the same 401 body; the cause is
/// only logged.
#[derive(Debug)]
pub struct AuthResponse {
    status: StatusCode,
    message: &'static str,
}

impl AuthResponse {
    fn from_error(error: AuthError) -> Self {
        match error {
            AuthError::Directory(e) => {
                tracing::error!(error = %e, "Member lookup failed during authentication");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal server error",
                }
            }
            other => {
                tracing::debug!(reason = %other, "Request rejected by auth middleware");
                Self::unauthorized()
            }
        }
    }

    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized",
        }
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response();

        if self.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}

/// Logging middleware function
///
/// Logs method, path, status code and response time.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}

/// Tracing middleware function
///
/// Wraps the whole request in an `http_request` span, so log lines emitted
/// by handlers carry the method and path.
pub async fn tracing_middleware(request: Request, next: Next) -> Response {
    use tracing::Instrument;

    let method = request.method().clone();
    let uri = request.uri().clone();

    let span = tracing::info_span!(
        "http_request",
        http.method = %method,
        http.path = %uri.path(),
        http.status_code = tracing::field::Empty,
    );

    async move {
        let response = next.run(request).await;
        tracing::Span::current().record("http.status_code", response.status().as_u16());
        response
    }
    .instrument(span)
    .await
}
