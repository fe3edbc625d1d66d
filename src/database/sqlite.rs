//! SQLite implementation of the MemberDirectory trait
//!
//! This module provides a SQLite-backed member directory using rusqlite and
//! tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{ErrorCode, OptionalExtension};
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::MemberDirectory;
use crate::error::DbError;
use crate::models::{Member, MemberUpdate, NewMember};

const SELECT_MEMBER: &str =
    "SELECT id, name, email, username, password_hash, created_at FROM members";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open (or create) the database and apply the schema
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;

        tracing::debug!(path = %path, "Member database ready");

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl MemberDirectory for SqliteDatabase {
    async fn ping(&self) -> Result<(), DbError> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_member(&self, member: &NewMember) -> Result<Member, DbError> {
        let name = member.name.clone();
        let email = member.email.clone();
        let username = member.username.clone();
        let password_hash = member.password_hash.clone();
        let created_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"
                    INSERT INTO members (name, email, username, password_hash, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    rusqlite::params![name, email, username, password_hash, created_at],
                );

                if let Err(e) = inserted {
                    return match constraint_conflict(&e) {
                        Some(conflict) => Ok(Err(conflict)),
                        None => Err(e.into()),
                    };
                }

                let id = conn.last_insert_rowid();
                let member = conn.query_row(
                    &format!("{} WHERE id = ?1", SELECT_MEMBER),
                    [id],
                    member_from_row,
                )?;
                Ok(Ok(member))
            })
            .await?
    }

    async fn get_member(&self, id: i64) -> Result<Option<Member>, DbError> {
        self.conn
            .call(move |conn| {
                let member = conn
                    .query_row(
                        &format!("{} WHERE id = ?1", SELECT_MEMBER),
                        [id],
                        member_from_row,
                    )
                    .optional()?;
                Ok(member)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_member_by_username(&self, username: &str) -> Result<Option<Member>, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let member = conn
                    .query_row(
                        &format!("{} WHERE username = ?1", SELECT_MEMBER),
                        [&username],
                        member_from_row,
                    )
                    .optional()?;
                Ok(member)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_member_by_email(&self, email: &str) -> Result<Option<Member>, DbError> {
        let email = email.to_string();

        self.conn
            .call(move |conn| {
                let member = conn
                    .query_row(
                        &format!("{} WHERE email = ?1", SELECT_MEMBER),
                        [&email],
                        member_from_row,
                    )
                    .optional()?;
                Ok(member)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_members(&self) -> Result<Vec<Member>, DbError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_MEMBER))?;
                let members = stmt
                    .query_map([], member_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(members)
            })
            .await
            .map_err(Into::into)
    }

    async fn update_member(&self, id: i64, update: &MemberUpdate) -> Result<Member, DbError> {
        let name = update.name.clone();
        let email = update.email.clone();
        let username = update.username.clone();
        let password_hash = update.password_hash.clone();

        self.conn
            .call(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE members
                    SET name = COALESCE(?1, name),
                        email = COALESCE(?2, email),
                        username = COALESCE(?3, username),
                        password_hash = COALESCE(?4, password_hash)
                    WHERE id = ?5
                    "#,
                    rusqlite::params![name, email, username, password_hash, id],
                );

                match updated {
                    Ok(0) => return Ok(Err(DbError::NotFound)),
                    Ok(_) => {}
                    Err(e) => {
                        return match constraint_conflict(&e) {
                            Some(conflict) => Ok(Err(conflict)),
                            None => Err(e.into()),
                        };
                    }
                }

                let member = conn.query_row(
                    &format!("{} WHERE id = ?1", SELECT_MEMBER),
                    [id],
                    member_from_row,
                )?;
                Ok(Ok(member))
            })
            .await?
    }

    async fn delete_member(&self, id: i64) -> Result<(), DbError> {
        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute("DELETE FROM members WHERE id = ?1", [id])?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}

fn member_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        username: row.get(3)?,
        password_hash: row.get(4)?,
        created_at: parse_datetime(row.get::<_, Option<String>>(5)?).unwrap_or_default(),
    })
}

/// Map a constraint failure to the directory error it stands for
fn constraint_conflict(err: &rusqlite::Error) -> Option<DbError> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            let msg = msg.clone().unwrap_or_default();
            Some(if msg.contains("members.username") {
                DbError::DuplicateUsername
            } else if msg.contains("members.email") {
                DbError::DuplicateEmail
            } else {
                DbError::ConstraintViolation(msg)
            })
        }
        _ => None,
    }
}

/// Parse datetime string from SQLite
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // SQLite's CURRENT_TIMESTAMP format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}
