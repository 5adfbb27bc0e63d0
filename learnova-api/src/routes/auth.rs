/// Authentication and user endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/auth/register` (also `POST /api/v1/auth/users`): register
/// - `POST /api/v1/auth/login`: username or email + password, returns tokens
/// - `POST /api/v1/auth/refresh`: exchange a refresh token for an access token
/// - `GET|PUT|PATCH /api/v1/auth/users/me`: the caller's own account
/// - `GET /api/v1/auth/users`, `GET|PUT|PATCH|DELETE /api/v1/auth/users/:id`: admin only
///
/// `role` and `is_verified` are read-only after registration. Only an
/// authenticated admin may register another admin.

use std::borrow::Cow;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use learnova_shared::{
    auth::{authorization::require_admin, jwt, password},
    models::user::{CreateUser, UpdateUser, User, UserDetail, UserRole},
    validators::{validate_email_format, validate_phone_format, validate_username_format},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{CurrentUser, Json, MaybeUser, Paging, Path},
};
use learnova_shared::pagination::Page;

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/users", get(list_users).post(register))
        .route("/users/me", get(get_me).put(update_me).patch(update_me))
        .route(
            "/users/:id",
            get(get_user).put(update_user).patch(update_user).delete(delete_user),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validate_username_format")
    )]
    pub username: String,

    #[validate(
        length(min = 1, max = 254, message = "Enter a valid email address."),
        custom(function = "validate_email_format")
    )]
    pub email: String,

    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: String,

    pub password_confirm: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    pub role: Option<UserRole>,

    #[serde(default)]
    #[validate(custom(function = "validate_phone_format"))]
    pub phone: String,
}

impl RegisterRequest {
    /// Field checks plus the cross-field password rules
    fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_else(ValidationErrors::new);

        if self.password != self.password_confirm {
            errors.add(
                "password_confirm",
                ValidationError::new("mismatch").with_message(Cow::Borrowed("Passwords do not match.")),
            );
        }
        if let Err(message) = password::validate_password_strength(&self.password) {
            errors.add("password", ValidationError::new("weak").with_message(Cow::Owned(message)));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email address
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserDetail,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Editable account fields; unknown keys such as `role` are ignored
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validate_username_format")
    )]
    pub username: Option<String>,

    #[validate(
        length(min = 1, max = 254, message = "Enter a valid email address."),
        custom(function = "validate_email_format")
    )]
    pub email: Option<String>,

    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    #[validate(custom(function = "validate_phone_format"))]
    pub phone: Option<String>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub avatar: Option<Option<String>>,

    pub bio: Option<String>,
}

impl From<UpdateUserRequest> for UpdateUser {
    fn from(req: UpdateUserRequest) -> Self {
        UpdateUser {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            avatar: req.avatar,
            bio: req.bio,
        }
    }
}

/// Public registration
///
/// The role defaults to STUDENT. Requesting ADMIN needs an admin caller.
pub async fn register(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserDetail>)> {
    req.check()?;

    let role = req.role.unwrap_or_default();
    if role == UserRole::Admin && !caller.is_some_and(|c| c.role.is_admin()) {
        return Err(ApiError::Forbidden(
            "Only administrators can create administrator accounts.".to_string(),
        ));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            username: req.username,
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            role,
            phone: req.phone,
        },
    )
    .await?;

    info!(user_id = user.user.id, role = role.as_str(), "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = User::find_by_login(&state.db, &req.username)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::Unauthorized(BAD_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = user.id, "Failed login attempt");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }

    let tokens = jwt::issue_token_pair(user.id, user.role, state.jwt_secret(), &state.token_ttl())?;
    User::update_last_login(&state.db, user.id).await?;

    let user = User::find_detail(&state.db, user.id).await?.ok_or_else(ApiError::not_found)?;
    info!(user_id = user.user.id, "User logged in");

    Ok(Json(LoginResponse {
        access: tokens.access,
        refresh: tokens.refresh,
        user,
    }))
}

pub async fn refresh(State(state): State<AppState>, Json(req): Json<RefreshRequest>) -> ApiResult<Json<RefreshResponse>> {
    let access = jwt::refresh_access_token(&req.refresh, state.jwt_secret(), state.token_ttl().access)?;
    Ok(Json(RefreshResponse { access }))
}

pub async fn get_me(State(state): State<AppState>, CurrentUser(auth): CurrentUser) -> ApiResult<Json<UserDetail>> {
    let user = User::find_detail(&state.db, auth.user_id).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(user))
}

async fn apply_update(state: &AppState, id: i64, req: UpdateUserRequest) -> ApiResult<UserDetail> {
    req.validate()?;

    let update = UpdateUser::from(req);
    if !update.is_empty() {
        User::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    }

    User::find_detail(&state.db, id).await?.ok_or_else(ApiError::not_found)
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserDetail>> {
    Ok(Json(apply_update(&state, auth.user_id, req).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    paging: Paging,
) -> ApiResult<Json<Page<UserDetail>>> {
    require_admin(&auth)?;
    Ok(paging.page(User::list(&state.db, paging.request).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserDetail>> {
    require_admin(&auth)?;
    let user = User::find_detail(&state.db, id).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserDetail>> {
    require_admin(&auth)?;
    Ok(Json(apply_update(&state, id, req).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::not_found());
    }
    info!(user_id = id, deleted_by = auth.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "ada.l".to_string(),
            email: "ada@learnova.io".to_string(),
            password: "correct-horse".to_string(),
            password_confirm: "correct-horse".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: None,
            phone: String::new(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(request().check().is_ok());
    }

    #[test]
    fn test_password_mismatch() {
        let mut req = request();
        req.password_confirm = "something-else".to_string();

        let errors = req.check().unwrap_err();
        assert!(errors.field_errors().contains_key("password_confirm"));
    }

    #[test]
    fn test_numeric_password_rejected() {
        let mut req = request();
        req.password = "1234567890".to_string();
        req.password_confirm = req.password.clone();

        let errors = req.check().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_bad_username_and_email() {
        let mut req = request();
        req.username = "ada lovelace!".to_string();
        req.email = "not-an-email".to_string();

        let errors = req.check().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_update_ignores_role() {
        let req: UpdateUserRequest =
            serde_json::from_str(r#"{"role": "ADMIN", "first_name": "Grace", "avatar": null}"#).unwrap();

        assert_eq!(req.first_name.as_deref(), Some("Grace"));
        assert_eq!(req.avatar, Some(None));
        let update = UpdateUser::from(req);
        assert!(!update.is_empty());
    }
}
