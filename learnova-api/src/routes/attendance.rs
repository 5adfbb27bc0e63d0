/// Live sessions and attendance records
///
/// Sessions are course material, attendance rows are student records.
/// Both are written by the course's instructor or an admin.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use chrono::{DateTime, Utc};
use learnova_shared::{
    auth::{
        context::AuthContext,
        visibility::{resolve_visibility, Resource},
    },
    models::{
        attendance::{Attendance, AttendanceFilter, AttendanceStatus, CreateAttendance, UpdateAttendance},
        enrollment::Enrollment,
        live_session::{CreateLiveSession, LiveSession, UpdateLiveSession, DEFAULT_DURATION_MINUTES},
    },
    pagination::Page,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{does_not_exist, require_course_editor};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{CurrentUser, Json, Paging, Path, Query},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/:id",
            get(get_session).put(update_session).patch(update_session).delete(delete_session),
        )
        .route("/records", get(list_records).post(create_record))
        .route(
            "/records/:id",
            get(get_record).put(update_record).patch(update_record).delete(delete_record),
        )
}

// ----------------------------------------------------------------------------
// Sessions
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub course: Option<i64>,
}

fn default_duration() -> i32 {
    DEFAULT_DURATION_MINUTES
}

#[derive(Debug, Deserialize, Validate)]
pub struct SessionRequest {
    pub course: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub session_date: DateTime<Utc>,
    #[serde(default = "default_duration")]
    #[validate(range(min = 1))]
    pub duration_minutes: i32,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub meeting_url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSessionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub session_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub duration_minutes: Option<i32>,
    #[validate(length(max = 500))]
    pub meeting_url: Option<String>,
}

async fn visible_session(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<LiveSession> {
    let visibility = resolve_visibility(Some(auth), Resource::CourseMaterial);
    LiveSession::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)
}

pub async fn list_sessions(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<SessionQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<LiveSession>>> {
    let visibility = resolve_visibility(Some(&auth), Resource::CourseMaterial);
    Ok(paging.page(LiveSession::list(&state.db, &visibility, query.course, paging.request).await?))
}

pub async fn get_session(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LiveSession>> {
    Ok(Json(visible_session(&state, &auth, id).await?))
}

pub async fn create_session(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<SessionRequest>,
) -> ApiResult<(StatusCode, Json<LiveSession>)> {
    req.validate()?;
    require_course_editor(&state.db, &auth, "course", req.course).await?;

    let session = LiveSession::create(
        &state.db,
        CreateLiveSession {
            course_id: req.course,
            title: req.title,
            session_date: req.session_date,
            duration_minutes: req.duration_minutes,
            meeting_url: req.meeting_url,
        },
    )
    .await?;

    info!(session_id = session.id, course_id = session.course_id, "Live session scheduled");
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn update_session(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSessionRequest>,
) -> ApiResult<Json<LiveSession>> {
    let session = visible_session(&state, &auth, id).await?;
    require_course_editor(&state.db, &auth, "course", session.course_id).await?;
    req.validate()?;

    let update = UpdateLiveSession {
        title: req.title,
        session_date: req.session_date,
        duration_minutes: req.duration_minutes,
        meeting_url: req.meeting_url,
    };
    let session = LiveSession::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(session))
}

pub async fn delete_session(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let session = visible_session(&state, &auth, id).await?;
    require_course_editor(&state.db, &auth, "course", session.course_id).await?;

    LiveSession::delete(&state.db, id).await?;
    info!(session_id = id, deleted_by = auth.user_id, "Live session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Records
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    pub session: Option<i64>,
    pub student: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub session: i64,
    pub student: i64,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub status: Option<AttendanceStatus>,
    pub notes: Option<String>,
}

/// The visible record, after checking the caller may edit its session's course
async fn editable_record(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Attendance> {
    let visibility = resolve_visibility(Some(auth), Resource::StudentRecord);
    let record = Attendance::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let session = LiveSession::find_by_id(&state.db, record.session_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    require_course_editor(&state.db, auth, "session", session.course_id).await?;
    Ok(record)
}

pub async fn list_records(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<RecordQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<Attendance>>> {
    let visibility = resolve_visibility(Some(&auth), Resource::StudentRecord);
    let filter = AttendanceFilter {
        session: query.session,
        student: query.student,
    };
    Ok(paging.page(Attendance::list(&state.db, &visibility, filter, paging.request).await?))
}

pub async fn get_record(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Attendance>> {
    let visibility = resolve_visibility(Some(&auth), Resource::StudentRecord);
    let record = Attendance::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(record))
}

/// Marks a student enrolled in the session's course; one row per pair
pub async fn create_record(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<RecordRequest>,
) -> ApiResult<(StatusCode, Json<Attendance>)> {
    let session = LiveSession::find_by_id(&state.db, req.session)
        .await?
        .ok_or_else(|| does_not_exist("session", req.session))?;
    require_course_editor(&state.db, &auth, "session", session.course_id).await?;

    if !Enrollment::exists(&state.db, req.student, session.course_id).await? {
        return Err(ApiError::field("student", "Student is not enrolled in this course."));
    }

    let record = Attendance::create(
        &state.db,
        CreateAttendance {
            session_id: session.id,
            student_id: req.student,
            status: req.status,
            notes: req.notes,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecordRequest>,
) -> ApiResult<Json<Attendance>> {
    editable_record(&state, &auth, id).await?;

    let update = UpdateAttendance {
        status: req.status,
        notes: req.notes,
    };
    let record = Attendance::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    editable_record(&state, &auth, id).await?;

    Attendance::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let req: SessionRequest =
            serde_json::from_str(r#"{"course": 1, "title": "Q&A", "session_date": "2026-03-01T15:00:00Z"}"#).unwrap();

        assert_eq!(req.duration_minutes, 60);
        assert!(req.meeting_url.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_record_rejects_unknown_status() {
        let result = serde_json::from_str::<RecordRequest>(r#"{"session": 1, "student": 2, "status": "SICK"}"#);
        assert!(result.is_err());
    }
}
