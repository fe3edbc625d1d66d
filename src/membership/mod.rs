//! Membership service
//!
//! Orchestrates registration, login and member CRUD on top of the member
//! directory, the password hasher and the token issuer. Validation and
//! duplicate detection are reported from here; bearer authentication happens
//! before a request reaches this layer.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;

use crate::auth::password::{
    hash_password, verify_password, DUMMY_PASSWORD_HASH, MAX_PASSWORD_BYTES,
};
use crate::auth::ratelimit::{LoginThrottle, RateLimitConfig};
use crate::auth::token::{IssuedToken, TokenIssuer};
use crate::database::MemberDirectory;
use crate::error::{AppError, AuthError, HashError};
use crate::models::{
    LoginRequest, Member, MemberUpdate, NewMember, RegisterRequest, UpdateMemberRequest,
};

/// Result of a successful registration or login
#[derive(Debug, Clone)]
pub struct Session {
    pub member: Member,
    pub token: IssuedToken,
}

/// Membership service
pub struct MembershipService<D: MemberDirectory> {
    db: Arc<D>,
    tokens: Arc<TokenIssuer>,
    throttle: LoginThrottle,
}

impl<D: MemberDirectory> MembershipService<D> {
    /// Create a new membership service
    pub fn new(db: Arc<D>, tokens: Arc<TokenIssuer>, rate_limit: RateLimitConfig) -> Self {
        Self {
            db,
            tokens,
            throttle: LoginThrottle::new(rate_limit),
        }
    }

    /// Login throttle, exposed for housekeeping
    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    /// Register a new member and issue its first token
    pub async fn register(&self, request: RegisterRequest) -> Result<Session, AppError> {
        require("name", &request.name)?;
        require("email", &request.email)?;
        require("username", &request.username)?;
        require("password", &request.password)?;
        check_password_length(&request.password)?;

        let password_hash = hash_blocking(request.password).await?;
        let new_member = NewMember::new(
            request.name,
            request.email,
            request.username,
            password_hash,
        );

        let member = self.db.insert_member(&new_member).await?;
        let token = self.issue(&member)?;

        tracing::info!(member_id = member.id, username = %member.username, "Member registered");

        Ok(Session { member, token })
    }

    /// Check credentials and issue a fresh token
    ///
    /// Unknown usernames and wrong passwords fail identically. When
    /// `client_ip` is known, repeated failures from it are throttled.
    pub async fn login(
        &self,
        request: LoginRequest,
        client_ip: Option<IpAddr>,
    ) -> Result<Session, AppError> {
        if let Some(ip) = client_ip {
            self.throttle.check(ip)?;
        }

        require("username", &request.username)?;
        require("password", &request.password)?;

        let member = self.db.get_member_by_username(&request.username).await?;

        // Unknown usernames are checked against a dummy hash at the same cost
        let stored_hash = member
            .as_ref()
            .map(|m| m.password_hash.clone())
            .unwrap_or_else(|| DUMMY_PASSWORD_HASH.to_string());
        let verified = verify_blocking(request.password, stored_hash).await?;

        let member = match member {
            Some(member) if verified => member,
            _ => {
                if let Some(ip) = client_ip {
                    self.throttle.record_failure(ip);
                }
                tracing::debug!(username = %request.username, "Login rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if let Some(ip) = client_ip {
            self.throttle.reset(ip);
        }

        let token = self.issue(&member)?;
        tracing::info!(member_id = member.id, "Member logged in");

        Ok(Session { member, token })
    }

    /// All members in id order
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        Ok(self.db.list_members().await?)
    }

    /// One member by id
    pub async fn get_member(&self, id: i64) -> Result<Member, AppError> {
        self.db.get_member(id).await?.ok_or(AppError::NotFound)
    }

    /// Apply a partial update
    ///
    /// Provided fields must be non-empty. The password is re-hashed only when
    /// supplied. An update with no fields returns the stored record.
    pub async fn update_member(
        &self,
        id: i64,
        request: UpdateMemberRequest,
    ) -> Result<Member, AppError> {
        let mut update = MemberUpdate::default();

        if let Some(name) = request.name {
            require("name", &name)?;
            update = update.with_name(name);
        }
        if let Some(email) = request.email {
            require("email", &email)?;
            update = update.with_email(email);
        }
        if let Some(username) = request.username {
            require("username", &username)?;
            update = update.with_username(username);
        }
        if let Some(password) = request.password {
            require("password", &password)?;
            check_password_length(&password)?;
            update = update.with_password_hash(hash_blocking(password).await?);
        }

        if update.is_empty() {
            return self.get_member(id).await;
        }

        let member = self.db.update_member(id, &update).await?;
        tracing::info!(member_id = id, "Member updated");

        Ok(member)
    }

    /// Delete a member by id
    pub async fn delete_member(&self, id: i64) -> Result<(), AppError> {
        self.db.delete_member(id).await?;
        tracing::info!(member_id = id, "Member deleted");
        Ok(())
    }

    fn issue(&self, member: &Member) -> Result<IssuedToken, AppError> {
        self.tokens
            .issue(member.id, Utc::now())
            .map_err(|e| AppError::Internal(e.to_string()))
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn check_password_length(password: &str) -> Result<(), AppError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::Validation(format!(
            "password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hash task failed: {}", e)))?
        .map_err(AppError::from)
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, AppError> {
    let result = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {}", e)))?;

    match result {
        Ok(matched) => Ok(matched),
        Err(HashError::MalformedHash) => {
            tracing::warn!("Stored password hash is malformed");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
