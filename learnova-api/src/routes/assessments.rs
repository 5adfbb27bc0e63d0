/// Assessment endpoints: quizzes, questions, attempts, assignments and
/// submissions
///
/// Quizzes and assignments are course material; attempts and submissions
/// are student records. Writes on material need the course's instructor
/// or an admin. Students start attempts and submit work only in courses
/// they are enrolled in, and never see which options are correct.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use learnova_shared::{
    auth::{
        authorization::{require_enrolled, require_student, PERMISSION_DENIED},
        context::AuthContext,
        visibility::{resolve_visibility, Resource, Visibility},
    },
    models::{
        assignment::{Assignment, CreateAssignment, UpdateAssignment, DEFAULT_MAX_POINTS},
        quiz::{
            default_passing_score, CreateOption, CreateQuestion, CreateQuiz, Question, QuestionType, Quiz,
            QuizDetail, QuizFilter, UpdateQuiz, DEFAULT_MAX_ATTEMPTS,
        },
        quiz_attempt::{AttemptFilter, QuizAttempt, RecordResult},
        submission::{grade_in_range, CreateSubmission, Submission, SubmissionFilter, UpdateSubmission},
    },
    pagination::Page,
    validators::{validate_percentage, validate_quiz_time_limit},
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
        .route("/quizzes", get(list_quizzes).post(create_quiz))
        .route(
            "/quizzes/:id",
            get(get_quiz).put(update_quiz).patch(update_quiz).delete(delete_quiz),
        )
        .route("/quizzes/:id/questions", post(create_question))
        .route("/quiz-attempts", get(list_attempts).post(start_attempt))
        .route(
            "/quiz-attempts/:id",
            get(get_attempt)
                .put(record_attempt)
                .patch(record_attempt)
                .delete(delete_attempt),
        )
        .route("/assignments", get(list_assignments).post(create_assignment))
        .route(
            "/assignments/:id",
            get(get_assignment)
                .put(update_assignment)
                .patch(update_assignment)
                .delete(delete_assignment),
        )
        .route("/submissions", get(list_submissions).post(create_submission))
        .route(
            "/submissions/:id",
            get(get_submission)
                .put(update_submission)
                .patch(update_submission)
                .delete(delete_submission),
        )
        .route("/submissions/:id/grade", post(grade_submission))
}

fn material_of(auth: &AuthContext) -> Visibility {
    resolve_visibility(Some(auth), Resource::CourseMaterial)
}

fn records_of(auth: &AuthContext) -> Visibility {
    resolve_visibility(Some(auth), Resource::StudentRecord)
}

fn optional<T: Copy>(value: Option<T>, check: fn(T) -> Result<(), validator::ValidationError>) -> Result<(), validator::ValidationError> {
    value.map_or(Ok(()), check)
}

// ----------------------------------------------------------------------------
// Quizzes
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct QuizQuery {
    pub course: Option<i64>,
}

fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuizRequest {
    pub course: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time_limit_minutes: Option<i32>,
    #[serde(default = "default_passing_score")]
    pub passing_score: Decimal,
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: i32,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub time_limit_minutes: Option<Option<i32>>,
    pub passing_score: Option<Decimal>,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OptionRequest {
    #[validate(length(min = 1, max = 500))]
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub order: i32,
}

fn default_points() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default = "default_points")]
    #[validate(range(min = 0))]
    pub points: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub order: i32,
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<OptionRequest>,
}

/// Strips the answers when the caller is a student
fn for_caller(auth: &AuthContext, mut detail: QuizDetail) -> QuizDetail {
    if auth.role.is_student() {
        detail.hide_answers();
    }
    detail
}

pub async fn list_quizzes(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<QuizQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<QuizDetail>>> {
    let filter = QuizFilter {
        course: query.course,
        published_only: auth.role.is_student(),
    };
    let (quizzes, count) = Quiz::list(&state.db, &material_of(&auth), filter, paging.request).await?;
    let quizzes = quizzes.into_iter().map(|detail| for_caller(&auth, detail)).collect();
    Ok(paging.page((quizzes, count)))
}

async fn visible_quiz(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<QuizDetail> {
    Quiz::find_detail(&state.db, &material_of(auth), id, auth.role.is_student())
        .await?
        .ok_or_else(ApiError::not_found)
}

pub async fn get_quiz(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<QuizDetail>> {
    let detail = visible_quiz(&state, &auth, id).await?;
    Ok(Json(for_caller(&auth, detail)))
}

pub async fn create_quiz(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<QuizRequest>,
) -> ApiResult<(StatusCode, Json<Quiz>)> {
    validate_all(
        &req,
        [
            ("time_limit_minutes", optional(req.time_limit_minutes, validate_quiz_time_limit)),
            ("passing_score", validate_percentage(req.passing_score)),
        ],
    )?;
    require_course_editor(&state.db, &auth, "course", req.course).await?;

    let quiz = Quiz::create(
        &state.db,
        CreateQuiz {
            course_id: req.course,
            title: req.title,
            description: req.description,
            time_limit_minutes: req.time_limit_minutes,
            passing_score: req.passing_score,
            max_attempts: req.max_attempts,
            is_published: req.is_published,
        },
    )
    .await?;

    info!(quiz_id = quiz.id, course_id = quiz.course_id, "Quiz created");
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// The visible quiz, after checking the caller may edit its course
async fn editable_quiz(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Quiz> {
    let quiz = visible_quiz(state, auth, id).await?.quiz;
    require_course_editor(&state.db, auth, "course", quiz.course_id).await?;
    Ok(quiz)
}

pub async fn update_quiz(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateQuizRequest>,
) -> ApiResult<Json<Quiz>> {
    editable_quiz(&state, &auth, id).await?;
    validate_all(
        &req,
        [
            (
                "time_limit_minutes",
                optional(req.time_limit_minutes.flatten(), validate_quiz_time_limit),
            ),
            ("passing_score", optional(req.passing_score, validate_percentage)),
        ],
    )?;

    let update = UpdateQuiz {
        title: req.title,
        description: req.description,
        time_limit_minutes: req.time_limit_minutes,
        passing_score: req.passing_score,
        max_attempts: req.max_attempts,
        is_published: req.is_published,
    };
    let quiz = Quiz::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    editable_quiz(&state, &auth, id).await?;

    Quiz::delete(&state.db, id).await?;
    info!(quiz_id = id, deleted_by = auth.user_id, "Quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Adds a question with its options to a quiz
pub async fn create_question(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<QuestionRequest>,
) -> ApiResult<(StatusCode, Json<Question>)> {
    let quiz = editable_quiz(&state, &auth, id).await?;
    req.validate()?;

    let options = req
        .options
        .into_iter()
        .map(|option| CreateOption {
            option_text: option.option_text,
            is_correct: option.is_correct,
            order: option.order,
        })
        .collect();

    let question = Question::create(
        &state.db,
        CreateQuestion {
            quiz_id: quiz.id,
            question_text: req.question_text,
            question_type: req.question_type,
            points: req.points,
            order: req.order,
            options,
        },
    )
    .await?;

    info!(quiz_id = quiz.id, question_id = question.id, options = question.options.len(), "Question added");
    Ok((StatusCode::CREATED, Json(question)))
}

// ----------------------------------------------------------------------------
// Quiz attempts
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AttemptQuery {
    pub quiz: Option<i64>,
    pub student: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    pub quiz: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordAttemptRequest {
    pub score: Option<Decimal>,
    pub passed: Option<bool>,
    pub submitted_at: Option<DateTime<Utc>>,
}

pub async fn list_attempts(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<AttemptQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<QuizAttempt>>> {
    let filter = AttemptFilter {
        quiz: query.quiz,
        student: query.student,
    };
    Ok(paging.page(QuizAttempt::list(&state.db, &records_of(&auth), filter, paging.request).await?))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<QuizAttempt>> {
    let attempt = QuizAttempt::find_visible(&state.db, &records_of(&auth), id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(attempt))
}

/// A student starts an attempt on a published quiz of an enrolled course
pub async fn start_attempt(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<StartAttemptRequest>,
) -> ApiResult<(StatusCode, Json<QuizAttempt>)> {
    require_student(&auth, "Only students can attempt quizzes.")?;

    let quiz = Quiz::find_by_id(&state.db, req.quiz)
        .await?
        .filter(|quiz| quiz.is_published)
        .ok_or_else(|| does_not_exist("quiz", req.quiz))?;
    require_enrolled(&state.db, &auth, quiz.course_id).await?;

    let attempt = QuizAttempt::start(&state.db, auth.user_id, quiz.id).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// The visible attempt and its quiz, for the quiz's course editor
async fn editable_attempt(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<(QuizAttempt, Quiz)> {
    let attempt = QuizAttempt::find_visible(&state.db, &records_of(auth), id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let quiz = Quiz::find_by_id(&state.db, attempt.quiz_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    require_course_editor(&state.db, auth, "quiz", quiz.course_id).await?;
    Ok((attempt, quiz))
}

/// Records the result; `passed` defaults to `score >= passing_score`
pub async fn record_attempt(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<RecordAttemptRequest>,
) -> ApiResult<Json<QuizAttempt>> {
    let (attempt, quiz) = editable_attempt(&state, &auth, id).await?;
    validate_all(&req, [("score", optional(req.score, validate_percentage))])?;

    let result = RecordResult {
        score: req.score,
        passed: req.passed,
        submitted_at: req.submitted_at,
    };
    let attempt = QuizAttempt::record(&state.db, attempt.id, result, quiz.passing_score)
        .await?
        .ok_or_else(ApiError::not_found)?;

    info!(attempt_id = attempt.id, score = ?attempt.score, passed = ?attempt.passed, "Quiz attempt recorded");
    Ok(Json(attempt))
}

pub async fn delete_attempt(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    editable_attempt(&state, &auth, id).await?;

    QuizAttempt::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Assignments
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AssignmentQuery {
    pub course: Option<i64>,
}

fn default_max_points() -> i32 {
    DEFAULT_MAX_POINTS
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignmentRequest {
    pub course: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default = "default_max_points")]
    #[validate(range(min = 1, max = 999))]
    pub max_points: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAssignmentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[validate(range(min = 1, max = 999))]
    pub max_points: Option<i32>,
}

pub async fn list_assignments(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<AssignmentQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<Assignment>>> {
    let rows = Assignment::list(&state.db, &material_of(&auth), query.course, paging.request).await?;
    Ok(paging.page(rows))
}

async fn visible_assignment(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Assignment> {
    Assignment::find_visible(&state.db, &material_of(auth), id)
        .await?
        .ok_or_else(ApiError::not_found)
}

pub async fn get_assignment(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Assignment>> {
    Ok(Json(visible_assignment(&state, &auth, id).await?))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<AssignmentRequest>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
    req.validate()?;
    require_course_editor(&state.db, &auth, "course", req.course).await?;

    let assignment = Assignment::create(
        &state.db,
        CreateAssignment {
            course_id: req.course,
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            max_points: req.max_points,
        },
    )
    .await?;

    info!(assignment_id = assignment.id, course_id = assignment.course_id, "Assignment created");
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAssignmentRequest>,
) -> ApiResult<Json<Assignment>> {
    let assignment = visible_assignment(&state, &auth, id).await?;
    require_course_editor(&state.db, &auth, "course", assignment.course_id).await?;
    req.validate()?;

    let update = UpdateAssignment {
        title: req.title,
        description: req.description,
        due_date: req.due_date,
        max_points: req.max_points,
    };
    let assignment = Assignment::update(&state.db, id, update).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(assignment))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let assignment = visible_assignment(&state, &auth, id).await?;
    require_course_editor(&state.db, &auth, "course", assignment.course_id).await?;

    Assignment::delete(&state.db, id).await?;
    info!(assignment_id = id, deleted_by = auth.user_id, "Assignment deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Submissions
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SubmissionQuery {
    pub assignment: Option<i64>,
    pub student: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmissionRequest {
    pub assignment: i64,
    #[validate(length(max = 500))]
    pub file: Option<String>,
    #[serde(default)]
    pub text_submission: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSubmissionRequest {
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub file: Option<Option<String>>,
    pub text_submission: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub grade: Decimal,
    #[serde(default)]
    pub feedback: String,
}

pub async fn list_submissions(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Query(query): Query<SubmissionQuery>,
    paging: Paging,
) -> ApiResult<Json<Page<Submission>>> {
    let filter = SubmissionFilter {
        assignment: query.assignment,
        student: query.student,
    };
    Ok(paging.page(Submission::list(&state.db, &records_of(&auth), filter, paging.request).await?))
}

async fn visible_submission(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<Submission> {
    Submission::find_visible(&state.db, &records_of(auth), id)
        .await?
        .ok_or_else(ApiError::not_found)
}

pub async fn get_submission(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Submission>> {
    Ok(Json(visible_submission(&state, &auth, id).await?))
}

/// A student submits once per assignment of an enrolled course
pub async fn create_submission(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Json(req): Json<SubmissionRequest>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    require_student(&auth, "Only students can submit assignments.")?;
    req.validate()?;

    let assignment = Assignment::find_by_id(&state.db, req.assignment)
        .await?
        .ok_or_else(|| does_not_exist("assignment", req.assignment))?;
    require_enrolled(&state.db, &auth, assignment.course_id).await?;

    let submission = Submission::create(
        &state.db,
        CreateSubmission {
            assignment_id: assignment.id,
            student_id: auth.user_id,
            file: req.file,
            text_submission: req.text_submission,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// The submitting student edits file or text until the work is graded
pub async fn update_submission(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSubmissionRequest>,
) -> ApiResult<Json<Submission>> {
    let submission = visible_submission(&state, &auth, id).await?;
    if submission.student_id != auth.user_id {
        return Err(ApiError::Forbidden(PERMISSION_DENIED.to_string()));
    }
    req.validate()?;

    let update = UpdateSubmission {
        file: req.file,
        text_submission: req.text_submission,
    };
    let submission = Submission::update(&state.db, id, update)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(submission))
}

/// The visible submission and its assignment, for the course editor
async fn gradable_submission(state: &AppState, auth: &AuthContext, id: i64) -> ApiResult<(Submission, Assignment)> {
    let submission = visible_submission(state, auth, id).await?;
    let assignment = Assignment::find_by_id(&state.db, submission.assignment_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    require_course_editor(&state.db, auth, "assignment", assignment.course_id).await?;
    Ok((submission, assignment))
}

pub async fn delete_submission(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    gradable_submission(&state, &auth, id).await?;

    Submission::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grades a submission once; the grade must lie in `0..=max_points`
pub async fn grade_submission(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<GradeRequest>,
) -> ApiResult<Json<Submission>> {
    let (submission, assignment) = gradable_submission(&state, &auth, id).await?;

    if !grade_in_range(req.grade, assignment.max_points) {
        return Err(ApiError::field(
            "grade",
            format!("Grade must be between 0 and {}.", assignment.max_points),
        ));
    }

    let graded = Submission::grade(&state.db, submission.id, req.grade, req.feedback)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(graded))
}
