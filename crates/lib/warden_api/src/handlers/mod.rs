//! Request handlers.

pub mod auth;
pub mod federated;
pub mod health;
