/// Bearer token authentication
///
/// Runs in front of every `/api/v1` route. A request without an
/// `Authorization` header continues anonymously; a request with a header
/// must carry a valid access token, otherwise it is rejected with 401
/// before reaching the handler. On success the [`AuthContext`] is stored in
/// the request extensions for [`crate::extract::CurrentUser`].

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use learnova_shared::auth::{
    context::{parse_bearer, AuthContext},
    jwt,
};
use tracing::debug;

use crate::{app::AppState, error::ApiError};

const MALFORMED_HEADER: &str = "Invalid Authorization header. Expected 'Bearer <token>'.";

/// Resolves the caller from the access token, if any
pub fn resolve(header_value: Option<&str>, secret: &str) -> Result<Option<AuthContext>, ApiError> {
    let Some(value) = header_value else {
        return Ok(None);
    };

    let token = parse_bearer(value).ok_or_else(|| ApiError::Unauthorized(MALFORMED_HEADER.to_string()))?;
    let claims = jwt::validate_access_token(token, secret)?;
    Ok(Some(AuthContext::from_claims(&claims)?))
}

pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let header_value = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::Unauthorized(MALFORMED_HEADER.to_string()))?,
        ),
        None => None,
    };

    if let Some(auth) = resolve(header_value, state.jwt_secret())? {
        debug!(user_id = auth.user_id, role = auth.role.as_str(), "Authenticated request");
        req.extensions_mut().insert(auth);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use learnova_shared::auth::jwt::{create_token, Claims, TokenType};
    use learnova_shared::models::user::UserRole;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_no_header_is_anonymous() {
        assert!(resolve(None, SECRET).unwrap().is_none());
    }

    #[test]
    fn test_valid_access_token() {
        let token = create_token(&Claims::new(12, UserRole::Instructor, TokenType::Access), SECRET).unwrap();
        let header = format!("Bearer {}", token);

        let auth = resolve(Some(&header), SECRET).unwrap().unwrap();
        assert_eq!(auth, AuthContext::new(12, UserRole::Instructor));
    }

    #[test]
    fn test_refresh_token_is_rejected() {
        let token = create_token(&Claims::new(12, UserRole::Student, TokenType::Refresh), SECRET).unwrap();
        let header = format!("Bearer {}", token);

        let err = resolve(Some(&header), SECRET).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_malformed_header() {
        let err = resolve(Some("Token abc"), SECRET).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = resolve(Some("Bearer not-a-jwt"), SECRET).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
