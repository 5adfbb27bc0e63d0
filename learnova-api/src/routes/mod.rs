/// API route handlers, one module per resource group
///
/// - `health`: liveness and database check
/// - `auth`: registration, login, token refresh, users
/// - `courses`: courses, categories, modules, lessons
/// - `enrollments`: enrollments, lesson progress, certificates
/// - `assessments`: quizzes, questions, attempts, assignments, submissions
/// - `attendance`: live sessions and attendance records
/// - `communications`: announcements
/// - `analytics`: reports and dashboards

pub mod analytics;
pub mod assessments;
pub mod attendance;
pub mod auth;
pub mod communications;
pub mod courses;
pub mod enrollments;
pub mod health;

use learnova_shared::auth::{authorization, context::AuthContext};
use learnova_shared::models::course::Course;
use sqlx::PgPool;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{ApiError, ApiResult};

/// Field error for a foreign key that names no row
pub(crate) fn does_not_exist(field: &str, id: i64) -> ApiError {
    ApiError::field(field, format!("Invalid pk \"{id}\" - object does not exist."))
}

/// Requires `auth` to edit the course, reporting a missing course on `field`
pub(crate) async fn require_course_editor(
    db: &PgPool,
    auth: &AuthContext,
    field: &str,
    course_id: i64,
) -> ApiResult<()> {
    let instructor_id = Course::instructor_of(db, course_id)
        .await?
        .ok_or_else(|| does_not_exist(field, course_id))?;
    authorization::require_course_editor(auth, instructor_id)?;
    Ok(())
}

/// Derived payload checks plus per-field checks the derive cannot express
pub(crate) fn validate_all<T: Validate>(
    payload: &T,
    extra: impl IntoIterator<Item = (&'static str, Result<(), ValidationError>)>,
) -> ApiResult<()> {
    let mut errors = payload.validate().err().unwrap_or_else(ValidationErrors::new);
    for (field, result) in extra {
        if let Err(error) = result {
            errors.add(field, error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}
