/// Enrollment endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/enrollments/enroll`: a student enrolls in a published course
/// - `GET /api/v1/enrollments/my-courses`: the caller's enrollments, unpaginated
/// - `GET|POST /api/v1/enrollments/`, `GET|PUT|PATCH|DELETE /api/v1/enrollments/:id`
/// - `POST /api/v1/enrollments/:id/certificate`: issue the certificate
/// - `/api/v1/enrollments/lesson-progress[/:id]`: per-lesson completion
/// - `GET /api/v1/enrollments/certificates[/:id]`: read-only
///
/// Everything here is a student record: students see their own rows,
/// instructors the rows of their courses, admins everything.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use learnova_shared::{
    auth::{
        authorization::{require_admin, require_student, PERMISSION_DENIED},
        context::AuthContext,
        visibility::{resolve_visibility, Resource, Visibility},
    },
    errors::DomainError,
    models::{
        certificate::Certificate,
        course::Course,
        enrollment::{Enrollment, EnrollmentFilter, EnrollmentStatus, UpdateEnrollment},
        lesson::Lesson,
        lesson_progress::{LessonProgress, ProgressUpdate},
    },
    pagination::Page,
    validators::validate_percentage,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{does_not_exist, require_course_editor, validate_all};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{CurrentUser, Json, Paging, Path, Query},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_enrollments).post(create_enrollment))
        .route("/enroll", post(enroll))
        .route("/my-courses", get(my_courses))
        .route(
            "/:id",
            get(get_enrollment)
                .put(update_enrollment)
                .patch(update_enrollment)
                .delete(delete_enrollment),
        )
        .route("/:id/certificate", post(issue_certificate))
        .route("/lesson-progress", get(list_progress).post(create_progress))
        .route(
            "/lesson-progress/:id",
            get(get_progress)
                .put(update_progress)
                .patch(update_progress)
                .delete(delete_progress),
        )
        .route("/certificates", get(list_certificates))
        .route("/certificates/:id", get(get_certificate))
}

fn records_of(auth: &AuthContext) -> Visibility {
    resolve_visibility(Some(auth), Resource::StudentRecord)
}

async fn visible_enrollment(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Enrollment> {
    Enrollment::find_visible(&state.db, &records_of(auth), id)
        .await?
        .ok_or_else(ApiError::not_found)
}

// ----------------------------------------------------------------------------
// Enroll
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub course_id: Option<i64>,
}

/// Enrolls the calling student
///
/// Checks run in a fixed order: missing `course_id` (400), non-student
/// caller (403), missing or unpublished course (404), existing enrollment
/// (400).
pub async fn enroll(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<EnrollRequest>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let course_id = req
        .course_id
        .ok_or_else(|| ApiError::BadRequest("course_id is required".to_string()))?;

    require_student(&auth, "Only students can enroll")?;

    let course = Course::find_published(&state.db, course_id)
        .await?
        .ok_or(DomainError::CourseNotPublished)?;

    let enrollment = Enrollment::enroll(&state.db, auth.user_id, course.id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn my_courses(State(state): State<AppState>, CurrentUser(auth): CurrentUser) -> ApiResult<Json<Vec<Enrollment>>> {
    require_student(&auth, "Students only")?;
    Ok(Json(Enrollment::for_student(&state.db, auth.user_id).await?))
}

// ----------------------------------------------------------------------------
// Enrollments
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub student: i64,
    pub course: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEnrollmentRequest {
    pub status: Option<EnrollmentStatus>,
    pub progress_percent: Option<Decimal>,
}

pub async fn list_enrollments(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(filter): Query<EnrollmentFilter>,
    paging: Paging,
) -> ApiResult<Json<Page<Enrollment>>> {
    Ok(paging.page(Enrollment::list(&state.db, &records_of(&auth), filter, paging.request).await?))
}

/// Enrolls any student in any course, published or not
pub async fn create_enrollment(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<CreateEnrollmentRequest>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    require_admin(&auth)?;

    if Course::instructor_of(&state.db, req.course).await?.is_none() {
        return Err(does_not_exist("course", req.course));
    }

    let enrollment = Enrollment::enroll(&state.db, req.student, req.course).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Enrollment>> {
    Ok(Json(visible_enrollment(&state, &auth, id).await?))
}

/// Students may only drop their own enrollment; the course's instructor
/// and admins may set any status and the progress
pub async fn update_enrollment(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEnrollmentRequest>,
) -> ApiResult<Json<Enrollment>> {
    let enrollment = visible_enrollment(&state, &auth, id).await?;

    if auth.role.is_student() {
        let dropping_only = req.status == Some(EnrollmentStatus::Dropped) && req.progress_percent.is_none();
        if !dropping_only {
            return Err(ApiError::Forbidden(PERMISSION_DENIED.to_string()));
        }
    } else {
        require_course_editor(&state.db, &auth, "course", enrollment.course_id).await?;
    }

    validate_all(
        &req,
        [("progress_percent", req.progress_percent.map_or(Ok(()), validate_percentage))],
    )?;

    let update = UpdateEnrollment {
        status: req.status,
        progress_percent: req.progress_percent,
    };
    let updated = Enrollment::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;

    if updated.status != enrollment.status {
        info!(
            enrollment_id = id,
            from = ?enrollment.status,
            to = ?updated.status,
            changed_by = auth.user_id,
            "Enrollment status changed"
        );
    }
    Ok(Json(updated))
}

pub async fn delete_enrollment(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let enrollment = visible_enrollment(&state, &auth, id).await?;
    require_course_editor(&state.db, &auth, "course", enrollment.course_id).await?;

    Enrollment::delete(&state.db, id).await?;
    info!(enrollment_id = id, deleted_by = auth.user_id, "Enrollment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 201 with a new certificate, or 200 with the one already issued
pub async fn issue_certificate(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<Certificate>)> {
    let enrollment = visible_enrollment(&state, &auth, id).await?;
    require_course_editor(&state.db, &auth, "course", enrollment.course_id).await?;

    let (certificate, created) = Certificate::issue(&state.db, &enrollment).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(certificate)))
}

// ----------------------------------------------------------------------------
// Lesson progress
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub enrollment: Option<i64>,
}

fn default_completed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateProgressRequest {
    pub enrollment: i64,
    pub lesson: i64,
    #[serde(default = "default_completed")]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProgressRequest {
    pub completed: bool,
}

/// Students write progress on their own enrollments; instructors and
/// admins on enrollments of courses they edit
async fn require_progress_writer(state: &AppState, auth: &AuthContext, enrollment: &Enrollment) -> ApiResult<()> {
    if auth.role.is_student() {
        if enrollment.student_id == auth.user_id {
            return Ok(());
        }
        return Err(ApiError::Forbidden(PERMISSION_DENIED.to_string()));
    }
    require_course_editor(&state.db, auth, "enrollment", enrollment.course_id).await
}

/// The visible progress row plus its enrollment, after the write check
async fn writable_progress(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<LessonProgress> {
    let progress = LessonProgress::find_visible(&state.db, &records_of(auth), id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let enrollment = Enrollment::find_by_id(&state.db, progress.enrollment_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    require_progress_writer(state, auth, &enrollment).await?;
    Ok(progress)
}

pub async fn list_progress(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<ProgressQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<LessonProgress>>> {
    let rows = LessonProgress::list(&state.db, &records_of(&auth), query.enrollment, paging.request).await?;
    Ok(paging.page(rows))
}

pub async fn get_progress(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LessonProgress>> {
    let progress = LessonProgress::find_visible(&state.db, &records_of(&auth), id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(progress))
}

pub async fn create_progress(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<CreateProgressRequest>,
) -> ApiResult<(StatusCode, Json<ProgressUpdate>)> {
    let enrollment = Enrollment::find_visible(&state.db, &records_of(&auth), req.enrollment)
        .await?
        .ok_or_else(|| does_not_exist("enrollment", req.enrollment))?;
    require_progress_writer(&state, &auth, &enrollment).await?;

    let lesson_course = Lesson::course_id(&state.db, req.lesson)
        .await?
        .ok_or_else(|| does_not_exist("lesson", req.lesson))?;
    if lesson_course != enrollment.course_id {
        return Err(ApiError::field("lesson", "Lesson does not belong to the enrolled course."));
    }

    let update = LessonProgress::create(&state.db, enrollment.id, req.lesson, req.completed).await?;
    info!(
        enrollment_id = enrollment.id,
        lesson_id = req.lesson,
        progress_percent = %update.progress_percent,
        "Lesson progress recorded"
    );
    Ok((StatusCode::CREATED, Json(update)))
}

pub async fn update_progress(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProgressRequest>,
) -> ApiResult<Json<ProgressUpdate>> {
    writable_progress(&state, &auth, id).await?;

    let update = LessonProgress::set_completed(&state.db, id, req.completed)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(update))
}

pub async fn delete_progress(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    writable_progress(&state, &auth, id).await?;

    if !LessonProgress::delete(&state.db, id).await? {
        return Err(ApiError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Certificates
// ----------------------------------------------------------------------------

pub async fn list_certificates(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    paging: Paging,
) -> ApiResult<Json<Page<Certificate>>> {
    Ok(paging.page(Certificate::list(&state.db, &records_of(&auth), paging.request).await?))
}

pub async fn get_certificate(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Certificate>> {
    let certificate = Certificate::find_visible(&state.db, &records_of(&auth), id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(certificate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_request_tolerates_missing_course() {
        let req: EnrollRequest = serde_json::from_str("{}").unwrap();
        assert!(req.course_id.is_none());
    }

    #[test]
    fn test_progress_defaults_to_completed() {
        let req: CreateProgressRequest = serde_json::from_str(r#"{"enrollment": 1, "lesson": 2}"#).unwrap();
        assert!(req.completed);
    }

    #[test]
    fn test_percentage_out_of_range_is_a_field_error() {
        let req: UpdateEnrollmentRequest = serde_json::from_str(r#"{"progress_percent": "120.00"}"#).unwrap();
        let err = validate_all(
            &req,
            [("progress_percent", req.progress_percent.map_or(Ok(()), validate_percentage))],
        )
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(err, ApiError::Validation(ref fields) if fields.contains_key("progress_percent")));
    }
}
