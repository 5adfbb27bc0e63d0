/// Per-lesson completion within an enrollment
///
/// Every write recomputes the enrollment's `progress_percent` in the same
/// transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::enrollment::Enrollment;
use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

pub const UNIQUE_CONSTRAINT: &str = "lesson_progress_enrollment_id_lesson_id_key";

const COLUMNS: &str = "id, enrollment_id, lesson_id, completed, completed_at";

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: "lp.id, lp.enrollment_id, lp.lesson_id, lp.completed, lp.completed_at",
    from: "lesson_progress lp JOIN enrollments e ON e.id = lp.enrollment_id",
    columns: ScopeColumns {
        course_id: "e.course_id",
        student_id: Some("e.student_id"),
        system_wide: None,
    },
    id_column: "lp.id",
    order_by: "lp.enrollment_id, lp.lesson_id",
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LessonProgress {
    pub id: i64,
    #[serde(rename = "enrollment")]
    pub enrollment_id: i64,
    #[serde(rename = "lesson")]
    pub lesson_id: i64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A progress row and the enrollment percentage it produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(flatten)]
    pub progress: LessonProgress,
    #[serde(serialize_with = "crate::models::fixed_point::serialize")]
    pub progress_percent: Decimal,
}

impl LessonProgress {
    /// Records progress on a lesson not yet tracked for the enrollment
    pub async fn create(
        pool: &PgPool,
        enrollment_id: i64,
        lesson_id: i64,
        completed: bool,
    ) -> Result<ProgressUpdate, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let progress = sqlx::query_as::<_, LessonProgress>(&format!(
            "INSERT INTO lesson_progress (enrollment_id, lesson_id, completed, completed_at)
             VALUES ($1, $2, $3, CASE WHEN $3 THEN NOW() END)
             RETURNING {COLUMNS}"
        ))
        .bind(enrollment_id)
        .bind(lesson_id)
        .bind(completed)
        .fetch_one(&mut *tx)
        .await?;

        let progress_percent = Enrollment::recompute_progress(&mut tx, enrollment_id).await?;
        tx.commit().await?;

        Ok(ProgressUpdate {
            progress,
            progress_percent,
        })
    }

    /// Flips completion; `completed_at` is kept from the first completion
    pub async fn set_completed(pool: &PgPool, id: i64, completed: bool) -> Result<Option<ProgressUpdate>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let progress = sqlx::query_as::<_, LessonProgress>(&format!(
            "UPDATE lesson_progress
             SET completed = $2,
                 completed_at = CASE WHEN $2 THEN COALESCE(completed_at, NOW()) ELSE NULL END
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(completed)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(progress) = progress else {
            return Ok(None);
        };

        let progress_percent = Enrollment::recompute_progress(&mut tx, progress.enrollment_id).await?;
        tx.commit().await?;

        Ok(Some(ProgressUpdate {
            progress,
            progress_percent,
        }))
    }

    pub async fn find_visible(pool: &PgPool, visibility: &Visibility, id: i64) -> Result<Option<Self>, sqlx::Error> {
        QUERY.find(pool, visibility, id).await
    }

    pub async fn list(
        pool: &PgPool,
        visibility: &Visibility,
        enrollment_id: Option<i64>,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(enrollment_id) = enrollment_id {
                qb.push(" AND lp.enrollment_id = ").push_bind(enrollment_id);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    /// Removes the row and recomputes the enrollment percentage
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let enrollment_id: Option<i64> =
            sqlx::query_scalar("DELETE FROM lesson_progress WHERE id = $1 RETURNING enrollment_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(enrollment_id) = enrollment_id else {
            return Ok(false);
        };

        Enrollment::recompute_progress(&mut tx, enrollment_id).await?;
        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_update_json() {
        let update = ProgressUpdate {
            progress: LessonProgress {
                id: 1,
                enrollment_id: 2,
                lesson_id: 3,
                completed: true,
                completed_at: Some(Utc::now()),
            },
            progress_percent: Decimal::new(5000, 2),
        };

        let json = serde_json::to_value(update).unwrap();
        assert_eq!(json["enrollment"], 2);
        assert_eq!(json["lesson"], 3);
        assert_eq!(json["progress_percent"], "50.00");
    }
}
