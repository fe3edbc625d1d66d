//! Authentication system for membership-service
//!
//! This module provides:
//! - Password hashing and verification
//! - Session token issuance and verification
//! - Bearer header resolution to a member
//! - Throttling of failed logins

pub mod manager;
pub mod password;
pub mod ratelimit;
pub mod token;

pub use manager::{bearer_credential, AuthManager, BEARER_SCHEME};
pub use password::{hash_password, verify_password, DUMMY_PASSWORD_HASH, MAX_PASSWORD_BYTES};
pub use ratelimit::{LoginThrottle, RateLimitConfig};
pub use token::{Claims, IssuedToken, TokenIssuer, DEFAULT_TOKEN_TTL_SECS};
