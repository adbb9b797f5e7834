//! Route paths.

/// Prefix shared by every authentication route.
pub const AUTH_PREFIX: &str = "/api/auth";

pub const POST_AUTH_REGISTER: &str = "/api/auth/register";
pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const POST_AUTH_REFRESH: &str = "/api/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const POST_AUTH_LOGOUT_ALL: &str = "/api/auth/logout-all";
pub const GET_AUTH_ME: &str = "/api/auth/me";
pub const GET_AUTH_FEDERATED_START: &str = "/api/auth/federated/start";
pub const GET_AUTH_FEDERATED_CALLBACK: &str = "/api/auth/federated/callback";
pub const GET_HEALTH: &str = "/health";
