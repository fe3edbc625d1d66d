//! Authentication manager
//!
//! Resolves an `Authorization` header to the member it identifies. Every
//! failure is reported as an `AuthError`; the HTTP layer turns all of them
//! except directory failures into the same 401 body.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::database::MemberDirectory;
use crate::error::{AuthError, TokenError};
use crate::models::Member;

use super::token::TokenIssuer;

/// Authentication scheme accepted in the `Authorization` header
pub const BEARER_SCHEME: &str = "Bearer";

/// Authentication manager
pub struct AuthManager<D: MemberDirectory> {
    db: Arc<D>,
    tokens: Arc<TokenIssuer>,
}

impl<D: MemberDirectory> AuthManager<D> {
    /// Create a new authentication manager
    pub fn new(db: Arc<D>, tokens: Arc<TokenIssuer>) -> Self {
        Self { db, tokens }
    }

    /// Resolve an `Authorization` header value to a member
    pub async fn authenticate(&self, header: Option<&str>) -> Result<Member, AuthError> {
        self.authenticate_at(header, Utc::now()).await
    }

    /// Same as `authenticate`, checking expiry against `now`
    pub async fn authenticate_at(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Member, AuthError> {
        let token = header
            .and_then(bearer_credential)
            .ok_or(AuthError::Token(TokenError::Missing))?;

        let member_id = self.tokens.verify(token, now)?;

        match self.db.get_member(member_id).await {
            Ok(Some(member)) => Ok(member),
            Ok(None) => {
                tracing::debug!(member_id, "Token subject no longer exists");
                Err(AuthError::MemberNotFound)
            }
            Err(e) => Err(AuthError::Directory(e.to_string())),
        }
    }
}

/// Extract the credential from `Bearer <token>`
///
/// The scheme is matched case-insensitively. Returns `None` for any other
/// scheme or an empty credential.
pub fn bearer_credential(header: &str) -> Option<&str> {
    let (scheme, credential) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let credential = credential.trim();
    (!credential.is_empty()).then_some(credential)
}
