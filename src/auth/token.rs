//! Session token issuance and verification
//!
//! Session tokens are HS256 JWTs carrying the member id (`sub`), the expiry
//! (`exp`), the issue time (`iat`) and a random nonce (`jti`). They are not
//! stored anywhere; a token is valid until `now > exp`.
//!
//! The verifier only accepts HS256. A token whose header names any other
//! algorithm is rejected as a signature failure even if it was signed with
//! the right secret.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// The only accepted signing algorithm
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Default token lifetime in seconds
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Longest accepted token lifetime in seconds (one year)
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

/// Length of the random nonce in bytes
const NONCE_BYTES: usize = 16;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Member id as a decimal string
    pub sub: String,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Issued at, unix seconds
    pub iat: i64,
    /// Random nonce
    pub jti: String,
}

/// A freshly issued token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Encoded token to hand to the client
    pub token: String,
    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies session tokens with a process-wide secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: chrono::Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &TOKEN_ALGORITHM)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer from the signing secret and token lifetime
    ///
    /// The lifetime must be between one second and `MAX_TOKEN_TTL_SECS`.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        let secs = ttl.as_secs();
        if secs == 0 || secs > MAX_TOKEN_TTL_SECS {
            return Err(TokenError::InvalidLifetime {
                got: secs,
                max: MAX_TOKEN_TTL_SECS,
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: chrono::Duration::seconds(secs as i64),
        })
    }

    /// Token lifetime
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Issue a token for `subject_id`, valid until `now + ttl`
    pub fn issue(&self, subject_id: i64, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Encoding("expiry out of range".to_string()))?;
        let claims = Claims {
            sub: subject_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: generate_nonce(),
        };

        let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            // Round to whole seconds so it matches the `exp` claim
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Verify a token and return its subject id
    ///
    /// Expiry is checked against `now` with no leeway: a token is accepted
    /// at exactly `exp` and rejected one second later.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<i64, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        let claims = data.claims;
        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        claims.sub.parse::<i64>().map_err(|_| TokenError::Malformed)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        // Expiry is checked against the caller's clock in `verify`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation
    }
}

/// Random URL-safe nonce for the `jti` claim
fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
