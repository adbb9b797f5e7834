//! # warden_core
//!
//! Credential and session logic for Warden: password hashing, signed access
//! and refresh tokens, credential persistence, the abuse guard and Google
//! sign-in.

pub mod auth;
pub mod config;
pub mod federated;
pub mod migrate;
pub mod models;
pub mod rate_limit;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
