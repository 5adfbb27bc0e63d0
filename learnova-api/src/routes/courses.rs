/// Catalog endpoints: categories, courses, modules and lessons
///
/// Reads are open to anonymous callers and scoped by catalog visibility,
/// so students and anonymous callers only see PUBLISHED courses and their
/// content. Categories are written by admins; courses, modules and lessons
/// by the course's instructor or an admin.

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use learnova_shared::{
    auth::{
        authorization::{self, require_admin, require_instructor_or_admin},
        context::AuthContext,
        visibility::{resolve_visibility, Resource},
    },
    models::{
        category::{Category, CreateCategory, UpdateCategory},
        course::{
            Course, CourseAudience, CourseDetail, CourseFilter, CourseStatus, CourseSummary, CreateCourse,
            UpdateCourse, DEFAULT_LEVEL,
        },
        lesson::{CreateLesson, Lesson, LessonContentType, UpdateLesson},
        module::{CreateModule, Module, ModuleWithLessons, UpdateModule},
    },
    pagination::Page,
    validators::validate_slug_format,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{does_not_exist, require_course_editor};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{CurrentUser, Json, MaybeUser, Paging, Path, Query},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route(
            "/:id",
            get(get_course).put(update_course).patch(update_course).delete(delete_course),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category)
                .put(update_category)
                .patch(update_category)
                .delete(delete_category),
        )
        .route("/modules", get(list_modules).post(create_module))
        .route(
            "/modules/:id",
            get(get_module).put(update_module).patch(update_module).delete(delete_module),
        )
        .route("/lessons", get(list_lessons).post(create_lesson))
        .route(
            "/lessons/:id",
            get(get_lesson).put(update_lesson).patch(update_lesson).delete(delete_lesson),
        )
}

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

// ----------------------------------------------------------------------------
// Categories
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100), custom(function = "validate_slug_format"))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub class_range: String,
    pub parent: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100), custom(function = "validate_slug_format"))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub class_range: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub parent: Option<Option<i64>>,
}

pub async fn list_categories(State(state): State<AppState>, paging: Paging) -> ApiResult<Json<Page<Category>>> {
    Ok(paging.page(Category::list(&state.db, paging.request).await?))
}

pub async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Category>> {
    let category = Category::find_by_id(&state.db, id).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    require_admin(&auth)?;
    req.validate()?;

    let category = Category::create(
        &state.db,
        CreateCategory {
            name: req.name,
            slug: req.slug,
            description: req.description,
            class_range: req.class_range,
            parent_id: req.parent,
        },
    )
    .await?;

    info!(category_id = category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    require_admin(&auth)?;
    req.validate()?;

    if req.parent == Some(Some(id)) {
        return Err(ApiError::field("parent", "A category cannot be its own parent."));
    }

    let update = UpdateCategory {
        name: req.name,
        slug: req.slug,
        description: req.description,
        class_range: req.class_range,
        parent_id: req.parent,
    };
    let category = Category::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if !Category::delete(&state.db, id).await? {
        return Err(ApiError::not_found());
    }
    info!(category_id = id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Courses
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 200), custom(function = "validate_slug_format"))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<i64>,
    /// Honoured for admins only; instructors always own what they create
    pub instructor: Option<i64>,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default)]
    pub audience: CourseAudience,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub class_range: String,
    #[validate(url)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub duration_hours: i32,
    #[serde(default = "default_level")]
    #[validate(length(min = 1, max = 50))]
    pub level: String,
    #[validate(range(min = 1))]
    pub max_students: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200), custom(function = "validate_slug_format"))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub category: Option<Option<i64>>,
    pub instructor: Option<i64>,
    pub status: Option<CourseStatus>,
    pub audience: Option<CourseAudience>,
    #[validate(length(max = 50))]
    pub class_range: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub thumbnail: Option<Option<String>>,
    #[validate(range(min = 0))]
    pub duration_hours: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub level: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub max_students: Option<Option<i32>>,
}

pub async fn list_courses(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Query(filter): Query<CourseFilter>,
    paging: Paging,
) -> ApiResult<Json<Page<CourseSummary>>> {
    let visibility = resolve_visibility(caller.as_ref(), Resource::Catalog);
    Ok(paging.page(Course::list(&state.db, &visibility, filter, paging.request).await?))
}

pub async fn get_course(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CourseDetail>> {
    let visibility = resolve_visibility(caller.as_ref(), Resource::Catalog);
    let course = Course::find_detail(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(course))
}

pub async fn create_course(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<CourseRequest>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    require_instructor_or_admin(&auth)?;
    req.validate()?;

    let instructor_id = match req.instructor {
        Some(instructor) if auth.role.is_admin() => instructor,
        _ => auth.user_id,
    };

    let course = Course::create(
        &state.db,
        CreateCourse {
            title: req.title,
            slug: req.slug,
            description: req.description,
            category_id: req.category,
            instructor_id,
            status: req.status,
            audience: req.audience,
            class_range: req.class_range,
            thumbnail: req.thumbnail,
            duration_hours: req.duration_hours,
            level: req.level,
            max_students: req.max_students,
        },
    )
    .await?;

    info!(course_id = course.id, instructor_id, created_by = auth.user_id, "Course created");
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCourseRequest>,
) -> ApiResult<Json<Course>> {
    let visibility = resolve_visibility(Some(&auth), Resource::Catalog);
    let course = Course::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    authorization::require_course_editor(&auth, course.instructor_id)?;
    req.validate()?;

    let update = UpdateCourse {
        title: req.title,
        slug: req.slug,
        description: req.description,
        category_id: req.category,
        // reassignment is an admin action
        instructor_id: req.instructor.filter(|_| auth.role.is_admin()),
        status: req.status,
        audience: req.audience,
        class_range: req.class_range,
        thumbnail: req.thumbnail,
        duration_hours: req.duration_hours,
        level: req.level,
        max_students: req.max_students,
    };
    let course = Course::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;

    info!(course_id = course.id, status = ?course.status, "Course updated");
    Ok(Json(course))
}

pub async fn delete_course(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let visibility = resolve_visibility(Some(&auth), Resource::Catalog);
    let course = Course::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    authorization::require_course_editor(&auth, course.instructor_id)?;

    Course::delete(&state.db, id).await?;
    info!(course_id = id, deleted_by = auth.user_id, "Course deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Modules
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ModuleQuery {
    pub course: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ModuleRequest {
    pub course: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub order: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateModuleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
}

pub async fn list_modules(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Query(query): Query<ModuleQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<ModuleWithLessons>>> {
    let visibility = resolve_visibility(caller.as_ref(), Resource::Catalog);
    Ok(paging.page(Module::list(&state.db, &visibility, query.course, paging.request).await?))
}

pub async fn get_module(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ModuleWithLessons>> {
    let visibility = resolve_visibility(caller.as_ref(), Resource::Catalog);
    let module = Module::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(module))
}

pub async fn create_module(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<ModuleRequest>,
) -> ApiResult<(StatusCode, Json<Module>)> {
    req.validate()?;
    require_course_editor(&state.db, &auth, "course", req.course).await?;

    let module = Module::create(
        &state.db,
        CreateModule {
            course_id: req.course,
            title: req.title,
            order: req.order,
        },
    )
    .await?;

    info!(module_id = module.id, course_id = module.course_id, "Module created");
    Ok((StatusCode::CREATED, Json(module)))
}

/// The visible module, after checking the caller may edit its course
async fn editable_module(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Module> {
    let visibility = resolve_visibility(Some(auth), Resource::Catalog);
    let module = Module::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?
        .module;
    require_course_editor(&state.db, auth, "course", module.course_id).await?;
    Ok(module)
}

pub async fn update_module(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateModuleRequest>,
) -> ApiResult<Json<Module>> {
    editable_module(&state, &auth, id).await?;
    req.validate()?;

    let update = UpdateModule {
        title: req.title,
        order: req.order,
    };
    let module = Module::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(module))
}

pub async fn delete_module(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    editable_module(&state, &auth, id).await?;

    Module::delete(&state.db, id).await?;
    info!(module_id = id, deleted_by = auth.user_id, "Module deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Lessons
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LessonQuery {
    pub module: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LessonRequest {
    pub module: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub content_type: LessonContentType,
    #[serde(default)]
    pub content_url: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub duration_minutes: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub order: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub content_type: Option<LessonContentType>,
    pub content_url: Option<String>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
}

pub async fn list_lessons(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Query(query): Query<LessonQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<Lesson>>> {
    let visibility = resolve_visibility(caller.as_ref(), Resource::Catalog);
    Ok(paging.page(Lesson::list(&state.db, &visibility, query.module, paging.request).await?))
}

pub async fn get_lesson(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Lesson>> {
    let visibility = resolve_visibility(caller.as_ref(), Resource::Catalog);
    let lesson = Lesson::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(lesson))
}

/// Checks the caller may edit the course that owns `module_id`
async fn require_module_editor(
    state: &AppState,
    auth: &AuthContext,
    module_id: i64,
) -> ApiResult<()> {
    let module = Module::find_by_id(&state.db, module_id)
        .await?
        .ok_or_else(|| does_not_exist("module", module_id))?;
    require_course_editor(&state.db, auth, "module", module.course_id).await
}

pub async fn create_lesson(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<LessonRequest>,
) -> ApiResult<(StatusCode, Json<Lesson>)> {
    req.validate()?;
    require_module_editor(&state, &auth, req.module).await?;

    let lesson = Lesson::create(
        &state.db,
        CreateLesson {
            module_id: req.module,
            title: req.title,
            content_type: req.content_type,
            content_url: req.content_url,
            duration_minutes: req.duration_minutes,
            order: req.order,
        },
    )
    .await?;

    info!(lesson_id = lesson.id, module_id = lesson.module_id, "Lesson created");
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn editable_lesson(
    state: &AppState,
    auth: &AuthContext,
    id: i64,
) -> ApiResult<Lesson> {
    let visibility = resolve_visibility(Some(auth), Resource::Catalog);
    let lesson = Lesson::find_visible(&state.db, &visibility, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    require_module_editor(state, auth, lesson.module_id).await?;
    Ok(lesson)
}

pub async fn update_lesson(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateLessonRequest>,
) -> ApiResult<Json<Lesson>> {
    editable_lesson(&state, &auth, id).await?;
    req.validate()?;

    let update = UpdateLesson {
        title: req.title,
        content_type: req.content_type,
        content_url: req.content_url,
        duration_minutes: req.duration_minutes,
        order: req.order,
    };
    let lesson = Lesson::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    editable_lesson(&state, &auth, id).await?;

    Lesson::delete(&state.db, id).await?;
    info!(lesson_id = id, deleted_by = auth.user_id, "Lesson deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_defaults() {
        let req: CourseRequest = serde_json::from_str(r#"{"title": "Algebra I", "slug": "algebra-i"}"#).unwrap();

        assert_eq!(req.status, CourseStatus::Draft);
        assert_eq!(req.audience, CourseAudience::Student);
        assert_eq!(req.level, "Beginner");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_course_rejects_bad_slug() {
        let req: CourseRequest = serde_json::from_str(r#"{"title": "Algebra I", "slug": "Algebra I"}"#).unwrap();

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("slug"));
    }

    #[test]
    fn test_update_course_distinguishes_null() {
        let req: UpdateCourseRequest = serde_json::from_str(r#"{"category": null}"#).unwrap();
        assert_eq!(req.category, Some(None));
        assert_eq!(req.thumbnail, None);
    }

    #[test]
    fn test_lesson_requires_content_type() {
        let result = serde_json::from_str::<LessonRequest>(r#"{"module": 1, "title": "Intro"}"#);
        assert!(result.is_err());
    }
}
