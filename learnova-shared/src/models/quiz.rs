/// Quizzes, their questions and answer options
///
/// A quiz belongs to a course and is course material: students see the
/// published quizzes of courses they are enrolled in. Questions and options
/// are ordered by `order`. [`QuizDetail::hide_answers`] strips `is_correct`
/// before a quiz is shown to a student.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

pub fn default_passing_score() -> Decimal {
    Decimal::new(6000, 2)
}

const COLUMNS: &str = "id, course_id, title, description, time_limit_minutes, passing_score, \
     max_attempts, is_published, created_at, updated_at";

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: "q.id, q.course_id, q.title, q.description, q.time_limit_minutes, q.passing_score, \
             q.max_attempts, q.is_published, q.created_at, q.updated_at",
    from: "quizzes q",
    columns: ScopeColumns {
        course_id: "q.course_id",
        student_id: None,
        system_wide: None,
    },
    id_column: "q.id",
    order_by: "q.created_at DESC, q.id DESC",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "question_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quiz {
    pub id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: Option<i32>,
    #[serde(serialize_with = "crate::models::fixed_point::serialize")]
    pub passing_score: Decimal,
    pub max_attempts: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuestionOption {
    pub id: i64,
    #[serde(skip)]
    pub question_id: i64,
    pub option_text: String,
    /// `None` once hidden from a student
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    #[serde(skip)]
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub order: i32,
    #[sqlx(skip)]
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

/// A quiz with its ordered questions and options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone)]
pub struct CreateQuiz {
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: Option<i32>,
    pub passing_score: Decimal,
    pub max_attempts: i32,
    pub is_published: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateQuiz {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_limit_minutes: Option<Option<i32>>,
    pub passing_score: Option<Decimal>,
    pub max_attempts: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct QuizFilter {
    pub course: Option<i64>,
    /// Restricts to published quizzes; set for students
    pub published_only: bool,
}

#[derive(Debug, Clone)]
pub struct CreateOption {
    pub option_text: String,
    pub is_correct: bool,
    pub order: i32,
}

#[derive(Debug, Clone)]
pub struct CreateQuestion {
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub order: i32,
    pub options: Vec<CreateOption>,
}

impl QuizDetail {
    pub fn hide_answers(&mut self) {
        for question in &mut self.questions {
            for option in &mut question.options {
                option.is_correct = None;
            }
        }
    }

    async fn load(pool: &PgPool, quiz: Quiz) -> Result<Self, sqlx::Error> {
        let questions = Question::for_quiz(pool, quiz.id).await?;
        Ok(QuizDetail { quiz, questions })
    }
}

impl Quiz {
    pub async fn create(pool: &PgPool, data: CreateQuiz) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Quiz>(&format!(
            "INSERT INTO quizzes (course_id, title, description, time_limit_minutes, passing_score, max_attempts, is_published)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        ))
        .bind(data.course_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.time_limit_minutes)
        .bind(data.passing_score)
        .bind(data.max_attempts)
        .bind(data.is_published)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The quiz with questions and options if `visibility` allows it
    pub async fn find_detail(
        pool: &PgPool,
        visibility: &Visibility,
        id: i64,
        published_only: bool,
    ) -> Result<Option<QuizDetail>, sqlx::Error> {
        let quiz: Option<Quiz> = QUERY.find(pool, visibility, id).await?;
        match quiz {
            Some(quiz) if !published_only || quiz.is_published => Ok(Some(QuizDetail::load(pool, quiz).await?)),
            _ => Ok(None),
        }
    }

    pub async fn list(
        pool: &PgPool,
        visibility: &Visibility,
        filter: QuizFilter,
        page: PageRequest,
    ) -> Result<(Vec<QuizDetail>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(course) = filter.course {
                qb.push(" AND q.course_id = ").push_bind(course);
            }
            if filter.published_only {
                qb.push(" AND q.is_published");
            }
        };
        let filter: Filter<'_> = &push;

        let (quizzes, count) = QUERY.page::<Quiz>(pool, visibility, filter, page).await?;
        let mut details = Vec::with_capacity(quizzes.len());
        for quiz in quizzes {
            details.push(QuizDetail::load(pool, quiz).await?);
        }
        Ok((details, count))
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateQuiz) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(time_limit) = data.time_limit_minutes {
            qb.push(", time_limit_minutes = ").push_bind(time_limit);
        }
        if let Some(passing_score) = data.passing_score {
            qb.push(", passing_score = ").push_bind(passing_score);
        }
        if let Some(max_attempts) = data.max_attempts {
            qb.push(", max_attempts = ").push_bind(max_attempts);
        }
        if let Some(is_published) = data.is_published {
            qb.push(", is_published = ").push_bind(is_published);
        }

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);
        qb.build_query_as::<Quiz>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Question {
    /// Ordered questions of a quiz with their ordered options
    pub async fn for_quiz(pool: &PgPool, quiz_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let mut questions = sqlx::query_as::<_, Question>(
            r#"SELECT id, quiz_id, question_text, question_type, points, "order"
               FROM quiz_questions WHERE quiz_id = $1 ORDER BY "order", id"#,
        )
        .bind(quiz_id)
        .fetch_all(pool)
        .await?;

        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let options = sqlx::query_as::<_, QuestionOption>(
            r#"SELECT id, question_id, option_text, is_correct, "order"
               FROM question_options WHERE question_id = ANY($1) ORDER BY "order", id"#,
        )
        .bind(&ids)
        .fetch_all(pool)
        .await?;

        for option in options {
            if let Some(question) = questions.iter_mut().find(|q| q.id == option.question_id) {
                question.options.push(option);
            }
        }
        Ok(questions)
    }

    /// Inserts a question and its options in one transaction
    pub async fn create(pool: &PgPool, data: CreateQuestion) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let mut question = sqlx::query_as::<_, Question>(
            r#"INSERT INTO quiz_questions (quiz_id, question_text, question_type, points, "order")
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, quiz_id, question_text, question_type, points, "order""#,
        )
        .bind(data.quiz_id)
        .bind(data.question_text)
        .bind(data.question_type)
        .bind(data.points)
        .bind(data.order)
        .fetch_one(&mut *tx)
        .await?;

        for option in data.options {
            let option = sqlx::query_as::<_, QuestionOption>(
                r#"INSERT INTO question_options (question_id, option_text, is_correct, "order")
                   VALUES ($1, $2, $3, $4)
                   RETURNING id, question_id, option_text, is_correct, "order""#,
            )
            .bind(question.id)
            .bind(option.option_text)
            .bind(option.is_correct)
            .bind(option.order)
            .fetch_one(&mut *tx)
            .await?;
            question.options.push(option);
        }

        tx.commit().await?;
        Ok(question)
    }
}
