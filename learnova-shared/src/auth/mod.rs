/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength checks
/// - [`jwt`]: Access/refresh token issuance and validation
/// - [`context`]: The authenticated caller attached to each request
/// - [`authorization`]: Role and object-level permission predicates
/// - [`visibility`]: Row-visibility resolution for list and detail queries
///
/// # Example
///
/// ```no_run
/// use learnova_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use learnova_shared::auth::password::{hash_password, verify_password};
/// use learnova_shared::models::user::UserRole;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse battery")?;
/// assert!(verify_password("correct horse battery", &hash)?);
///
/// let claims = Claims::new(42, UserRole::Student, TokenType::Access);
/// let token = create_token(&claims, "a-secret-that-is-at-least-32-bytes-long")?;
/// let validated = validate_access_token(&token, "a-secret-that-is-at-least-32-bytes-long")?;
/// assert_eq!(validated.user_id()?, 42);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod context;
pub mod jwt;
pub mod password;
pub mod visibility;
