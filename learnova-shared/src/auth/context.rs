/// The authenticated caller of a request
///
/// The API layer validates the bearer token, builds an [`AuthContext`] from
/// its claims and stores it in the request extensions. Handlers and the
/// permission predicates only ever see this type.

use serde::{Deserialize, Serialize};

use super::jwt::{Claims, JwtError};
use crate::models::user::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: UserRole,
}

impl AuthContext {
    pub fn new(user_id: i64, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Builds the context carried by a validated access token
    pub fn from_claims(claims: &Claims) -> Result<Self, JwtError> {
        Ok(Self {
            user_id: claims.user_id()?,
            role: claims.role,
        })
    }
}

/// Extracts the token from an `Authorization` header value
///
/// Accepts `Bearer <token>` with a case-insensitive scheme. Returns `None`
/// for any other scheme or an empty token.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenType;

    #[test]
    fn test_from_claims() {
        let claims = Claims::new(5, UserRole::Instructor, TokenType::Access);
        let ctx = AuthContext::from_claims(&claims).unwrap();

        assert_eq!(ctx, AuthContext::new(5, UserRole::Instructor));
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer("bearer   token "), Some("token"));
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer"), None);
    }
}
