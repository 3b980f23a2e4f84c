//! # PropTrack Shared Library
//!
//! Domain types, data access and business rules behind the PropTrack API.
//!
//! ## Module Organization
//!
//! - `auth`: Passwords, tokens, capability catalog and the authorization guard
//! - `db`: Connection pool and migrations
//! - `models`: Database models and their org-scoped queries
//! - `pagination`: Offset pagination shared by every list operation
//! - `store`: The injected data-access handle (PostgreSQL or in-memory)
//! - `services`: Use-case operations that run the guard before touching data

pub mod auth;
pub mod db;
pub mod models;
pub mod pagination;
pub mod services;
pub mod store;

/// Current version of the PropTrack shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
