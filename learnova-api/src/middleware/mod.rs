/// Middleware for the API server
///
/// - `auth`: bearer token authentication

pub mod auth;
