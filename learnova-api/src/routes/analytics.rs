/// Reports and dashboards
///
/// Counts are recomputed on every request. Reports and the overview are
/// admin only; the student roster is for instructors.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use learnova_shared::{
    auth::authorization::require_admin,
    models::report::{CreateReport, Overview, Report, ReportType, RosterEntry, UpdateReport},
    pagination::Page,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{CurrentUser, Json, Paging, Path, Query},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports", get(list_reports).post(create_report))
        .route(
            "/reports/:id",
            get(get_report).put(update_report).patch(update_report).delete(delete_report),
        )
        .route("/dashboard/overview", get(overview))
        .route("/dashboard/instructor/students", get(instructor_students))
}

fn empty_params() -> JsonValue {
    JsonValue::Object(Default::default())
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReportRequest {
    pub report_type: ReportType,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default = "empty_params")]
    pub params: JsonValue,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReportRequest {
    pub report_type: Option<ReportType>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub params: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
pub struct RosterQuery {
    pub course_id: Option<i64>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    paging: Paging,
) -> ApiResult<Json<Page<Report>>> {
    require_admin(&auth)?;
    Ok(paging.page(Report::list(&state.db, paging.request).await?))
}

pub async fn get_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Report>> {
    require_admin(&auth)?;
    let report = Report::find_by_id(&state.db, id).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(report))
}

pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<ReportRequest>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    require_admin(&auth)?;
    req.validate()?;

    let report = Report::create(
        &state.db,
        CreateReport {
            report_type: req.report_type,
            title: req.title,
            params: req.params,
        },
    )
    .await?;

    info!(report_id = report.id, report_type = ?report.report_type, "Report generated");
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn update_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateReportRequest>,
) -> ApiResult<Json<Report>> {
    require_admin(&auth)?;
    req.validate()?;

    let update = UpdateReport {
        report_type: req.report_type,
        title: req.title,
        params: req.params,
    };
    let report = Report::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(report))
}

pub async fn delete_report(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if !Report::delete(&state.db, id).await? {
        return Err(ApiError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Platform-wide totals
pub async fn overview(State(state): State<AppState>, CurrentUser(auth): CurrentUser) -> ApiResult<Json<Overview>> {
    require_admin(&auth)?;
    let overview = Overview::compute(&state.db).await?;
    debug!(?overview, "Overview computed");
    Ok(Json(overview))
}

/// Students enrolled in the caller's courses, as a plain array
pub async fn instructor_students(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<RosterQuery>,
) -> ApiResult<Json<Vec<RosterEntry>>> {
    if !auth.role.is_instructor() {
        return Err(ApiError::Forbidden("Instructors only".to_string()));
    }

    let roster = RosterEntry::for_instructor(&state.db, auth.user_id, query.course_id).await?;
    Ok(Json(roster))
}
