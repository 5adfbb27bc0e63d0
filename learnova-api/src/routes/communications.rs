/// Announcements
///
/// COURSE announcements are posted by the course's instructor or an admin
/// and read by the course's students. SYSTEM announcements have no course,
/// are posted by admins and are read by every student.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use learnova_shared::{
    auth::{
        authorization::{require_admin, require_instructor_or_admin},
        context::AuthContext,
        visibility::{resolve_visibility, Resource},
    },
    models::announcement::{Announcement, AnnouncementScope, CreateAnnouncement, UpdateAnnouncement},
    pagination::Page,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::require_course_editor;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{CurrentUser, Json, Paging, Path, Query},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/announcements", get(list_announcements).post(create_announcement))
        .route(
            "/announcements/:id",
            get(get_announcement)
                .put(update_announcement)
                .patch(update_announcement)
                .delete(delete_announcement),
        )
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementQuery {
    pub course: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnnouncementRequest {
    pub course: Option<i64>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub scope: AnnouncementScope,
    #[serde(default)]
    pub is_pinned: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    pub is_pinned: Option<bool>,
}

/// Admins own SYSTEM announcements; course editors own COURSE ones
async fn require_announcement_editor(
    state: &AppState,
    auth: &AuthContext,
    scope: AnnouncementScope,
    course_id: Option<i64>,
) -> ApiResult<()> {
    match (scope, course_id) {
        (AnnouncementScope::System, _) => Ok(require_admin(auth)?),
        (AnnouncementScope::Course, Some(course_id)) => {
            require_course_editor(&state.db, auth, "course", course_id).await
        }
        (AnnouncementScope::Course, None) => Err(ApiError::field(
            "course",
            "This field is required for course announcements.",
        )),
    }
}

async fn visible_announcement(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Announcement> {
    let visibility = resolve_visibility(Some(auth), Resource::Announcement);
    Announcement::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)
}

pub async fn list_announcements(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<AnnouncementQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<Announcement>>> {
    let visibility = resolve_visibility(Some(&auth), Resource::Announcement);
    Ok(paging.page(Announcement::list(&state.db, &visibility, query.course, paging.request).await?))
}

pub async fn get_announcement(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Announcement>> {
    Ok(Json(visible_announcement(&state, &auth, id).await?))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<AnnouncementRequest>,
) -> ApiResult<(StatusCode, Json<Announcement>)> {
    require_instructor_or_admin(&auth)?;
    req.validate()?;

    let course_id = match req.scope {
        AnnouncementScope::System => None,
        AnnouncementScope::Course => req.course,
    };
    require_announcement_editor(&state, &auth, req.scope, course_id).await?;

    let announcement = Announcement::create(
        &state.db,
        CreateAnnouncement {
            course_id,
            author_id: auth.user_id,
            title: req.title,
            content: req.content,
            scope: req.scope,
            is_pinned: req.is_pinned,
        },
    )
    .await?;

    info!(
        announcement_id = announcement.id,
        scope = ?announcement.scope,
        course_id = ?announcement.course_id,
        "Announcement posted"
    );
    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn update_announcement(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAnnouncementRequest>,
) -> ApiResult<Json<Announcement>> {
    let announcement = visible_announcement(&state, &auth, id).await?;
    require_announcement_editor(&state, &auth, announcement.scope, announcement.course_id).await?;
    req.validate()?;

    let update = UpdateAnnouncement {
        title: req.title,
        content: req.content,
        is_pinned: req.is_pinned,
    };
    let announcement = Announcement::update(&state.db, id, update)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(announcement))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let announcement = visible_announcement(&state, &auth, id).await?;
    require_announcement_editor(&state, &auth, announcement.scope, announcement.course_id).await?;

    Announcement::delete(&state.db, id).await?;
    info!(announcement_id = id, deleted_by = auth.user_id, "Announcement deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_defaults_to_course() {
        let req: AnnouncementRequest =
            serde_json::from_str(r#"{"course": 2, "title": "Exam moved", "content": "Now on Friday."}"#).unwrap();

        assert_eq!(req.scope, AnnouncementScope::Course);
        assert!(!req.is_pinned);
    }

    #[test]
    fn test_blank_content_rejected() {
        let req: AnnouncementRequest =
            serde_json::from_str(r#"{"title": "Hi", "content": "", "scope": "SYSTEM"}"#).unwrap();

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("content"));
    }
}
