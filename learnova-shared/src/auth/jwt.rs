/// JWT token generation and validation
///
/// Tokens are HS256-signed and carry the user id (as the standard `sub`
/// claim) together with the user's role, so request authentication never
/// needs a database round-trip.
///
/// # Token Types
///
/// - **Access Token**: short-lived (60 minutes by default), sent as
///   `Authorization: Bearer <token>`
/// - **Refresh Token**: long-lived (7 days by default), exchanged at
///   `/api/v1/auth/refresh` for a new access token
///
/// # Example
///
/// ```
/// use learnova_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use learnova_shared::models::user::UserRole;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = Claims::new(7, UserRole::Instructor, TokenType::Access);
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key")?;
/// assert_eq!(validated.user_id()?, 7);
/// assert_eq!(validated.role, UserRole::Instructor);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::UserRole;

/// Value of the `iss` claim on every token
pub const ISSUER: &str = "learnova";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,

    /// The token was valid but of the other kind
    #[error("Expected {expected} token")]
    WrongTokenType { expected: &'static str },

    /// The `sub` claim is not a user id
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    /// Lifetime used when the caller does not configure one
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::minutes(60),
            TokenType::Refresh => Duration::days(7),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Lifetimes for the two token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenTtl {
    pub fn for_type(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access,
            TokenType::Refresh => self.refresh,
        }
    }
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access: TokenType::Access.default_expiration(),
            refresh: TokenType::Refresh.default_expiration(),
        }
    }
}

/// JWT claims
///
/// Standard claims `sub`, `iss`, `iat`, `exp`, `nbf` plus the custom
/// `role` and `token_type` claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id in decimal
    pub sub: String,

    /// Issuer: always "learnova"
    pub iss: String,

    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    /// Role of the user at the time the token was issued
    pub role: UserRole,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the default lifetime for `token_type`
    pub fn new(user_id: i64, role: UserRole, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, role, token_type, token_type.default_expiration())
    }

    /// Claims expiring `expires_in` from now
    pub fn with_expiration(
        user_id: i64,
        role: UserRole,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            role,
            token_type,
        }
    }

    /// Parses the subject back into a user id
    pub fn user_id(&self) -> Result<i64, JwtError> {
        self.sub
            .parse()
            .map_err(|_| JwtError::InvalidSubject(self.sub.clone()))
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs `claims` with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, not-before and issuer, returning the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(e.to_string()),
    })?;

    Ok(data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.token_type != expected {
        return Err(JwtError::WrongTokenType {
            expected: expected.as_str(),
        });
    }
    Ok(claims)
}

/// Validates a token and requires it to be an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

/// Validates a token and requires it to be a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Access and refresh token for one login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues a fresh access/refresh pair for a user
pub fn issue_token_pair(
    user_id: i64,
    role: UserRole,
    secret: &str,
    ttl: &TokenTtl,
) -> Result<TokenPair, JwtError> {
    let access = Claims::with_expiration(user_id, role, TokenType::Access, ttl.access);
    let refresh = Claims::with_expiration(user_id, role, TokenType::Refresh, ttl.refresh);

    Ok(TokenPair {
        access: create_token(&access, secret)?,
        refresh: create_token(&refresh, secret)?,
    })
}

/// Exchanges a refresh token for a new access token
///
/// The role is carried over from the refresh token.
pub fn refresh_access_token(
    refresh_token: &str,
    secret: &str,
    access_ttl: Duration,
) -> Result<String, JwtError> {
    let refresh = validate_refresh_token(refresh_token, secret)?;
    let access = Claims::with_expiration(
        refresh.user_id()?,
        refresh.role,
        TokenType::Access,
        access_ttl,
    );
    create_token(&access, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::minutes(60));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(7));
    }

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new(12, UserRole::Student, TokenType::Access);

        assert_eq!(claims.sub, "12");
        assert_eq!(claims.user_id().unwrap(), 12);
        assert_eq!(claims.iss, "learnova");
        assert_eq!(claims.role, UserRole::Student);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_create_and_validate_token() {
        let claims = Claims::new(3, UserRole::Admin, TokenType::Access);
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.user_id().unwrap(), 3);
        assert_eq!(validated.role, UserRole::Admin);
        assert_eq!(validated.token_type, TokenType::Access);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let claims = Claims::new(1, UserRole::Student, TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(validate_token(&token, "another-secret-key-of-32-bytes-xx").is_err());
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(
            1,
            UserRole::Student,
            TokenType::Access,
            Duration::seconds(-3600),
        );
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut claims = Claims::new(1, UserRole::Student, TokenType::Access);
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::InvalidIssuer)));
    }

    #[test]
    fn test_token_type_enforced() {
        let access = create_token(&Claims::new(1, UserRole::Student, TokenType::Access), SECRET).unwrap();
        let refresh = create_token(&Claims::new(1, UserRole::Student, TokenType::Refresh), SECRET).unwrap();

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongTokenType { expected: "access" })
        ));
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(validate_refresh_token(&access, SECRET).is_err());
    }

    #[test]
    fn test_issue_pair_and_refresh() {
        let pair = issue_token_pair(9, UserRole::Instructor, SECRET, &TokenTtl::default()).unwrap();

        let access = validate_access_token(&pair.access, SECRET).unwrap();
        assert_eq!(access.user_id().unwrap(), 9);

        let renewed = refresh_access_token(&pair.refresh, SECRET, Duration::minutes(5)).unwrap();
        let renewed = validate_access_token(&renewed, SECRET).unwrap();
        assert_eq!(renewed.user_id().unwrap(), 9);
        assert_eq!(renewed.role, UserRole::Instructor);
        assert!(renewed.exp - renewed.iat <= 300);
    }

    #[test]
    fn test_refresh_with_access_token_fails() {
        let pair = issue_token_pair(9, UserRole::Student, SECRET, &TokenTtl::default()).unwrap();
        assert!(refresh_access_token(&pair.access, SECRET, Duration::minutes(5)).is_err());
    }

    #[test]
    fn test_non_numeric_subject() {
        let mut claims = Claims::new(1, UserRole::Student, TokenType::Access);
        claims.sub = "abc".to_string();
        assert!(matches!(claims.user_id(), Err(JwtError::InvalidSubject(_))));
    }
}
