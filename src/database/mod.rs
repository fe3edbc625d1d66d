//! Database layer for membership-service
//!
//! This module defines the member directory trait and its SQLite
//! implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{Member, MemberUpdate, NewMember};

/// Durable store of member records
///
/// Implementations must enforce username and email uniqueness atomically
/// with the write, so two concurrent inserts of the same username cannot
/// both succeed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Check that the store is reachable
    async fn ping(&self) -> Result<(), DbError>;

    /// Insert a member and return it with its assigned id
    ///
    /// Fails with `DuplicateUsername` or `DuplicateEmail` when either value
    /// is already taken.
    async fn insert_member(&self, member: &NewMember) -> Result<Member, DbError>;

    /// Get a member by id
    async fn get_member(&self, id: i64) -> Result<Option<Member>, DbError>;

    /// Get a member by exact username
    async fn get_member_by_username(&self, username: &str) -> Result<Option<Member>, DbError>;

    /// Get a member by exact email
    async fn get_member_by_email(&self, email: &str) -> Result<Option<Member>, DbError>;

    /// All members in id order
    async fn list_members(&self) -> Result<Vec<Member>, DbError>;

    /// Apply a partial update and return the stored result
    ///
    /// Returns `NotFound` when no member has `id`.
    async fn update_member(&self, id: i64, update: &MemberUpdate) -> Result<Member, DbError>;

    /// Delete a member by id
    ///
    /// Returns `NotFound` when no member has `id`.
    async fn delete_member(&self, id: i64) -> Result<(), DbError>;
}
