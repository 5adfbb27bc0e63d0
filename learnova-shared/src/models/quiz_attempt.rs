/// Quiz attempts
///
/// Students start attempts; the course's instructor or an admin records the
/// result. Attempts are not limited by `max_attempts`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

const COLUMNS: &str = "id, student_id, quiz_id, score, passed, started_at, submitted_at";

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: "a.id, a.student_id, a.quiz_id, a.score, a.passed, a.started_at, a.submitted_at",
    from: "quiz_attempts a JOIN quizzes q ON q.id = a.quiz_id",
    columns: ScopeColumns {
        course_id: "q.course_id",
        student_id: Some("a.student_id"),
        system_wide: None,
    },
    id_column: "a.id",
    order_by: "a.started_at DESC, a.id DESC",
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizAttempt {
    pub id: i64,
    #[serde(rename = "student")]
    pub student_id: i64,
    #[serde(rename = "quiz")]
    pub quiz_id: i64,
    #[serde(serialize_with = "crate::models::fixed_point::serialize_option")]
    pub score: Option<Decimal>,
    pub passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct AttemptFilter {
    pub quiz: Option<i64>,
    pub student: Option<i64>,
}

/// Result fields an instructor may record
#[derive(Debug, Clone, Default)]
pub struct RecordResult {
    pub score: Option<Decimal>,
    pub passed: Option<bool>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// `passed` as given, else derived from `score` against the quiz threshold
pub fn resolve_passed(score: Option<Decimal>, passed: Option<bool>, passing_score: Decimal) -> Option<bool> {
    match (passed, score) {
        (Some(passed), _) => Some(passed),
        (None, Some(score)) => Some(score >= passing_score),
        (None, None) => None,
    }
}

impl QuizAttempt {
    pub async fn start(pool: &PgPool, student_id: i64, quiz_id: i64) -> Result<Self, sqlx::Error> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(&format!(
            "INSERT INTO quiz_attempts (student_id, quiz_id) VALUES ($1, $2) RETURNING {COLUMNS}"
        ))
        .bind(student_id)
        .bind(quiz_id)
        .fetch_one(pool)
        .await?;

        info!(attempt = attempt.id, student_id, quiz_id, "Quiz attempt started");
        Ok(attempt)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, QuizAttempt>(&format!("SELECT {COLUMNS} FROM quiz_attempts WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_visible(pool: &PgPool, visibility: &Visibility, id: i64) -> Result<Option<Self>, sqlx::Error> {
        QUERY.find(pool, visibility, id).await
    }

    pub async fn list(
        pool: &PgPool,
        visibility: &Visibility,
        filter: AttemptFilter,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(quiz) = filter.quiz {
                qb.push(" AND a.quiz_id = ").push_bind(quiz);
            }
            if let Some(student) = filter.student {
                qb.push(" AND a.student_id = ").push_bind(student);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    /// Stores a result; `passed` falls back to `score >= passing_score`
    pub async fn record(
        pool: &PgPool,
        id: i64,
        data: RecordResult,
        passing_score: Decimal,
    ) -> Result<Option<Self>, sqlx::Error> {
        let passed = resolve_passed(data.score, data.passed, passing_score);

        if data.score.is_none() && passed.is_none() && data.submitted_at.is_none() {
            return Self::find_by_id(pool, id).await;
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quiz_attempts SET ");
        let mut fields = qb.separated(", ");
        if let Some(score) = data.score {
            fields.push("score = ").push_bind_unseparated(score);
        }
        if let Some(passed) = passed {
            fields.push("passed = ").push_bind_unseparated(passed);
        }
        if let Some(submitted_at) = data.submitted_at {
            fields.push("submitted_at = ").push_bind_unseparated(submitted_at);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);

        qb.build_query_as::<QuizAttempt>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quiz_attempts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_passed_derived_from_score() {
        assert_eq!(resolve_passed(Some(dec("75.00")), None, dec("60")), Some(true));
        assert_eq!(resolve_passed(Some(dec("60.00")), None, dec("60")), Some(true));
        assert_eq!(resolve_passed(Some(dec("59.99")), None, dec("60")), Some(false));
    }

    #[test]
    fn test_explicit_passed_wins() {
        assert_eq!(resolve_passed(Some(dec("10")), Some(true), dec("60")), Some(true));
        assert_eq!(resolve_passed(None, Some(false), dec("60")), Some(false));
    }

    #[test]
    fn test_no_result_leaves_passed_unset() {
        assert_eq!(resolve_passed(None, None, dec("60")), None);
    }
}
