//! membership-service - Member registration, login and token-protected CRUD
//!
//! This crate provides an HTTP service that stores members in SQLite, hashes
//! their passwords with argon2 and authenticates requests with signed,
//! expiring bearer tokens.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod membership;
pub mod models;
pub mod server;
pub mod telemetry;
