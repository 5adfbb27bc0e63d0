/// Error handling for the API server
///
/// Every failure leaves the server as the same JSON envelope:
///
/// ```json
/// {
///   "success": false,
///   "error": "Invalid input.",
///   "status_code": 400,
///   "details": { "email": ["Enter a valid email address."] }
/// }
/// ```
///
/// Handlers return [`ApiResult`]; errors from the shared crate convert with
/// `?`.
///
/// # Example
///
/// ```
/// use learnova_api::error::{ApiError, ApiResult};
///
/// fn find(id: i64) -> ApiResult<i64> {
///     if id > 0 {
///         Ok(id)
///     } else {
///         Err(ApiError::NotFound("Not found.".to_string()))
///     }
/// }
/// ```

use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use learnova_shared::auth::{authorization::AuthzError, jwt::JwtError, password::PasswordError};
use learnova_shared::errors::{DomainError, ServiceError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{ValidationErrors, ValidationErrorsKind};

pub type ApiResult<T> = Result<T, ApiError>;

/// Field name to messages, as rendered in `details`
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const NOT_FOUND: &str = "Not found.";
pub const INVALID_INPUT: &str = "Invalid input.";

/// Key for errors that belong to no single field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 with a single message
    #[error("{0}")]
    BadRequest(String),

    /// 400 with per-field messages
    #[error("Invalid input.")]
    Validation(FieldErrors),

    /// 401
    #[error("{0}")]
    Unauthorized(String),

    /// 403
    #[error("{0}")]
    Forbidden(String),

    /// 404
    #[error("{0}")]
    NotFound(String),

    /// 500; the message is logged, never sent
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub status_code: u16,
    pub details: Value,
}

impl ApiError {
    pub fn not_found() -> Self {
        ApiError::NotFound(NOT_FOUND.to_string())
    }

    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized(NOT_AUTHENTICATED.to_string())
    }

    /// A validation error on one field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(self) -> ErrorResponse {
        let status = self.status();
        let (error, details) = match self {
            ApiError::Validation(fields) => (INVALID_INPUT.to_string(), json!(fields)),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                let msg = "A server error occurred.".to_string();
                (msg.clone(), json!({ "detail": msg }))
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg) => (msg.clone(), json!({ "detail": msg })),
        };

        ErrorResponse {
            success: false,
            error,
            status_code: status.as_u16(),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.body())).into_response()
    }
}

/// Field and message reported for a unique constraint
fn unique_violation(constraint: &str) -> (&'static str, &'static str) {
    match constraint {
        "users_email_key" => ("email", "A user with this email already exists."),
        "users_username_key" => ("username", "A user with this username already exists."),
        "courses_slug_key" => ("slug", "course with this slug already exists."),
        "course_categories_slug_key" => ("slug", "category with this slug already exists."),
        "course_modules_course_id_order_key" => (NON_FIELD_ERRORS, "The fields course, order must make a unique set."),
        "enrollments_student_id_course_id_key" => (NON_FIELD_ERRORS, "The fields student, course must make a unique set."),
        "lesson_progress_enrollment_id_lesson_id_key" => {
            (NON_FIELD_ERRORS, "The fields enrollment, lesson must make a unique set.")
        }
        "certificates_enrollment_id_key" => ("enrollment", "certificate with this enrollment already exists."),
        "certificates_certificate_id_key" => ("certificate_id", "certificate with this certificate id already exists."),
        "assignment_submissions_assignment_id_student_id_key" => {
            (NON_FIELD_ERRORS, "The fields assignment, student must make a unique set.")
        }
        "attendance_session_id_student_id_key" => (NON_FIELD_ERRORS, "The fields session, student must make a unique set."),
        _ => (NON_FIELD_ERRORS, "This record already exists."),
    }
}

/// Client-caused SQLSTATE data errors that are not constraint violations
fn data_exception(code: &str) -> Option<&'static str> {
    match code {
        // numeric_value_out_of_range, e.g. a grade wider than NUMERIC(5, 2)
        "22003" => Some("A numeric value is out of the allowed range."),
        "22001" => Some("A value is too long for its field."),
        _ => None,
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found(),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let (field, message) = unique_violation(db_err.constraint().unwrap_or_default());
                    return ApiError::field(field, message);
                }
                if db_err.is_foreign_key_violation() {
                    return ApiError::BadRequest("Referenced object does not exist.".to_string());
                }
                if db_err.is_check_violation() {
                    return ApiError::BadRequest("A value is out of the allowed range.".to_string());
                }
                if let Some(message) = db_err.code().as_deref().and_then(data_exception) {
                    return ApiError::BadRequest(message.to_string());
                }
                ApiError::Internal(format!("Database error: {}", db_err))
            }
            other => ApiError::Internal(format!("Database error: {}", other)),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::CourseNotPublished => ApiError::NotFound(message),
            DomainError::NotEnrolled => ApiError::Forbidden(message),
            DomainError::DuplicateEnrollment
            | DomainError::AlreadyGraded
            | DomainError::EnrollmentNotCompleted => ApiError::BadRequest(message),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(err) => err.into(),
            ServiceError::Database(err) => err.into(),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden(msg) => ApiError::Forbidden(msg),
            AuthzError::Database(err) => err.into(),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::Internal(format!("Token creation failed: {}", msg)),
            JwtError::Expired => ApiError::Unauthorized("Token is expired".to_string()),
            _ => ApiError::Unauthorized("Given token not valid for any token type".to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(format!("Password operation failed: {}", err))
    }
}

fn collect_errors(prefix: &str, errors: &ValidationErrors, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let field: &str = field;
        let name = match (prefix.is_empty(), field) {
            (true, "__all__") => NON_FIELD_ERRORS.to_string(),
            (false, "__all__") => prefix.to_string(),
            (true, field) => field.to_string(),
            (false, field) => format!("{}.{}", prefix, field),
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(name).or_default();
                for error in list {
                    messages.push(
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value ({}).", error.code)),
                    );
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(&name, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_errors(&format!("{}[{}]", name, index), nested, out);
                }
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        collect_errors("", &errors, &mut fields);
        ApiError::Validation(fields)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::not_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{Validate, ValidationError};

    #[derive(Validate)]
    struct Signup {
        #[validate(length(min = 3, message = "Too short."))]
        username: String,
        #[validate(range(min = 1, max = 100))]
        page_size: u32,
    }

    fn parts(err: ApiError) -> (StatusCode, ErrorResponse) {
        (err.status(), err.body())
    }

    #[test]
    fn test_envelope_shape() {
        let (status, body) = parts(ApiError::Forbidden("Only students can enroll".to_string()));

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!body.success);
        assert_eq!(body.error, "Only students can enroll");
        assert_eq!(body.status_code, 403);
        assert_eq!(body.details["detail"], "Only students can enroll");
    }

    #[test]
    fn test_validation_details() {
        let errors = Signup {
            username: "ab".to_string(),
            page_size: 0,
        }
        .validate()
        .unwrap_err();

        let (status, body) = parts(errors.into());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, INVALID_INPUT);
        assert_eq!(body.details["username"][0], "Too short.");
        assert!(body.details["page_size"][0].as_str().unwrap().contains("range"));
    }

    #[test]
    fn test_schema_errors_become_non_field_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("__all__", ValidationError::new("mismatch").with_message("Passwords do not match.".into()));

        let (_, body) = parts(errors.into());
        assert_eq!(body.details[NON_FIELD_ERRORS][0], "Passwords do not match.");
    }

    #[test]
    fn test_domain_errors() {
        assert_eq!(ApiError::from(DomainError::DuplicateEnrollment).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(DomainError::CourseNotPublished).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(DomainError::NotEnrolled).status(), StatusCode::FORBIDDEN);

        let (_, body) = parts(DomainError::DuplicateEnrollment.into());
        assert_eq!(body.error, "Already enrolled");
    }

    #[test]
    fn test_internal_error_is_masked() {
        let (status, body) = parts(ApiError::Internal("connection reset by peer".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.contains("connection reset"));
    }

    #[test]
    fn test_row_not_found() {
        let (status, body) = parts(sqlx::Error::RowNotFound.into());
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, NOT_FOUND);
    }

    #[test]
    fn test_numeric_overflow_is_a_client_error() {
        assert!(data_exception("22003").is_some());
        assert!(data_exception("22001").is_some());
        assert_eq!(data_exception("40001"), None);
    }

    #[test]
    fn test_unique_violation_messages() {
        assert_eq!(unique_violation("users_email_key").0, "email");
        assert_eq!(
            unique_violation("attendance_session_id_student_id_key").1,
            "The fields session, student must make a unique set."
        );
        assert_eq!(unique_violation("something_else").0, NON_FIELD_ERRORS);
    }
}
