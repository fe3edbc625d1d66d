//! Member domain models
//!
//! `Member` is the stored record and carries the password hash, so it is not
//! serializable. Anything sent to a client goes through `MemberProfile`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Member record as held by the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Store-assigned identifier, never reused
    pub id: i64,

    /// Display name
    pub name: String,

    /// Unique email, exact match
    pub email: String,

    /// Unique login name, exact match
    pub username: String,

    /// Argon2id PHC string
    pub password_hash: String,

    /// When the member was created
    pub created_at: DateTime<Utc>,
}

/// Client-facing view of a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Member> for MemberProfile {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
            email: member.email.clone(),
            username: member.username.clone(),
            created_at: member.created_at,
        }
    }
}

impl From<Member> for MemberProfile {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            name: member.name,
            email: member.email,
            username: member.username,
            created_at: member.created_at,
        }
    }
}

/// Member to be inserted; the id is assigned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

impl NewMember {
    /// Create a new member record
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// Partial replacement of member fields; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

impl MemberUpdate {
    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.username.is_none()
            && self.password_hash.is_none()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }
}

/// Body of `POST /register`
///
/// Missing fields deserialize to empty strings and are rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Body of `POST /login`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Body of `PUT /update/{id}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMemberRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Response of `POST /register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub member: MemberProfile,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Response of `POST /login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Plain acknowledgement body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_member() -> Member {
        Member {
            id: 7,
            name: "Ann".to_string(),
            email: "ann@x.com".to_string(),
            username: "ann".to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_profile_has_no_password_material() {
        let profile = MemberProfile::from(&sample_member());
        let json = serde_json::to_value(&profile).unwrap();

        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "ann");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn test_member_update_is_empty() {
        assert!(MemberUpdate::default().is_empty());
        assert!(!MemberUpdate::default().with_name("Bob").is_empty());
        assert!(!MemberUpdate::default()
            .with_password_hash("$argon2id$...")
            .is_empty());
    }

    #[test]
    fn test_register_request_missing_fields_default_empty() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"name":"Ann","username":"ann"}"#).unwrap();
        assert_eq!(req.name, "Ann");
        assert_eq!(req.email, "");
        assert_eq!(req.password, "");
    }

    #[test]
    fn test_update_request_partial() {
        let req: UpdateMemberRequest = serde_json::from_str(r#"{"email":"new@x.com"}"#).unwrap();
        assert_eq!(req.email, Some("new@x.com".to_string()));
        assert!(req.name.is_none());
        assert!(req.password.is_none());
    }
}
