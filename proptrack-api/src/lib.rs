//! # PropTrack API Server Library
//!
//! HTTP surface over `proptrack-shared`'s services.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Service errors to HTTP responses
//! - `middleware`: Security headers
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
