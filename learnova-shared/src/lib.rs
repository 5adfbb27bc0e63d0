//! # Learnova Shared Library
//!
//! Domain types, SQL operations and auth primitives used by the Learnova
//! API server.
//!
//! ## Module Organization
//!
//! - `auth`: JWT tokens, password hashing, request auth context, permission
//!   predicates and the visibility resolver
//! - `db`: Connection pool and embedded migrations
//! - `errors`: Domain error types
//! - `models`: Database models and their queries
//! - `pagination`: Page requests and paginated envelopes
//! - `validators`: Field format validators shared by request payloads

pub mod auth;
pub mod db;
pub mod errors;
pub mod models;
pub mod pagination;
pub mod validators;

/// Current version of the Learnova shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
