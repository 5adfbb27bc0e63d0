/// Role-based permission checks
///
/// Roles are flat: ADMIN, INSTRUCTOR and STUDENT. The role predicates are
/// pure functions over an [`AuthContext`]. The two object-level checks look
/// at a course: `can_edit_course` compares the course's instructor with the
/// caller and `is_enrolled_student` asks the database for an enrollment row.
///
/// The `require_*` helpers turn a failed predicate into [`AuthzError`],
/// which the API layer renders as 403.
///
/// # Example
///
/// ```no_run
/// use learnova_shared::auth::authorization::{require_course_editor, require_enrolled};
/// use learnova_shared::auth::context::AuthContext;
/// use learnova_shared::models::course::Course;
/// use sqlx::PgPool;
///
/// async fn check(pool: &PgPool, auth: &AuthContext, course: &Course) -> Result<(), Box<dyn std::error::Error>> {
///     if auth.role.is_student() {
///         require_enrolled(pool, auth, course.id).await?;
///     } else {
///         require_course_editor(auth, course.instructor_id)?;
///     }
///     Ok(())
/// }
/// ```

use sqlx::PgPool;

use super::context::AuthContext;
use crate::models::enrollment::Enrollment;
use crate::models::user::UserRole;

/// Message used when no more specific one applies
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The caller's role or relationship to the object does not allow the action
    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuthzError {
    pub fn denied() -> Self {
        AuthzError::Forbidden(PERMISSION_DENIED.to_string())
    }
}

pub fn is_admin(auth: &AuthContext) -> bool {
    auth.role == UserRole::Admin
}

pub fn is_instructor_or_admin(auth: &AuthContext) -> bool {
    matches!(auth.role, UserRole::Instructor | UserRole::Admin)
}

pub fn is_student(auth: &AuthContext) -> bool {
    auth.role == UserRole::Student
}

/// Admins edit any course; instructors only the ones they teach
pub fn can_edit_course(auth: &AuthContext, course_instructor_id: i64) -> bool {
    match auth.role {
        UserRole::Admin => true,
        UserRole::Instructor => auth.user_id == course_instructor_id,
        UserRole::Student => false,
    }
}

/// True when the caller has an enrollment row for the course, whatever its status
pub async fn is_enrolled_student(
    pool: &PgPool,
    auth: &AuthContext,
    course_id: i64,
) -> Result<bool, sqlx::Error> {
    Enrollment::exists(pool, auth.user_id, course_id).await
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if is_admin(auth) {
        Ok(())
    } else {
        Err(AuthzError::denied())
    }
}

pub fn require_instructor_or_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if is_instructor_or_admin(auth) {
        Ok(())
    } else {
        Err(AuthzError::denied())
    }
}

/// Requires a student caller, failing with `message`
pub fn require_student(auth: &AuthContext, message: &str) -> Result<(), AuthzError> {
    if is_student(auth) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(message.to_string()))
    }
}

pub fn require_course_editor(auth: &AuthContext, course_instructor_id: i64) -> Result<(), AuthzError> {
    if can_edit_course(auth, course_instructor_id) {
        Ok(())
    } else {
        Err(AuthzError::denied())
    }
}

pub async fn require_enrolled(
    pool: &PgPool,
    auth: &AuthContext,
    course_id: i64,
) -> Result<(), AuthzError> {
    if is_enrolled_student(pool, auth, course_id).await? {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(
            "You are not enrolled in this course.".to_string(),
        ))
    }
}
