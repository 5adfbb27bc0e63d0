/// Enrollments
///
/// One row per (student, course), enforced by the
/// `enrollments_student_id_course_id_key` constraint. Status moves freely
/// between ACTIVE, COMPLETED and DROPPED; entering COMPLETED stamps
/// `completed_at` and leaving it clears the stamp.
///
/// # Example
///
/// ```no_run
/// use learnova_shared::errors::{DomainError, ServiceError};
/// use learnova_shared::models::enrollment::Enrollment;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// match Enrollment::enroll(&pool, 7, 3).await {
///     Ok(enrollment) => println!("enrolled, progress {}", enrollment.progress_percent),
///     Err(ServiceError::Domain(DomainError::DuplicateEnrollment)) => println!("already enrolled"),
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::fixed_point::two_places;
use super::lesson::Lesson;
use super::scoped::{no_filter, Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::errors::{is_unique_violation, DomainError, ServiceError};
use crate::pagination::PageRequest;

pub const UNIQUE_CONSTRAINT: &str = "enrollments_student_id_course_id_key";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "enrollment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Completed,
    Dropped,
}

const SELECT: &str = "e.id, e.student_id, TRIM(u.first_name || ' ' || u.last_name) AS student_name, \
     u.email AS student_email, e.course_id, c.title AS course_title, e.status, e.progress_percent, \
     e.enrolled_at, e.completed_at";

pub(crate) const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: SELECT,
    from: "enrollments e JOIN users u ON u.id = e.student_id JOIN courses c ON c.id = e.course_id",
    columns: ScopeColumns {
        course_id: "e.course_id",
        student_id: Some("e.student_id"),
        system_wide: None,
    },
    id_column: "e.id",
    order_by: "e.enrolled_at DESC, e.id DESC",
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enrollment {
    pub id: i64,
    #[serde(rename = "student")]
    pub student_id: i64,
    pub student_name: String,
    pub student_email: String,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub course_title: String,
    pub status: EnrollmentStatus,
    #[serde(serialize_with = "crate::models::fixed_point::serialize")]
    pub progress_percent: Decimal,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EnrollmentFilter {
    pub course: Option<i64>,
    pub student: Option<i64>,
    pub status: Option<EnrollmentStatus>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateEnrollment {
    pub status: Option<EnrollmentStatus>,
    pub progress_percent: Option<Decimal>,
}

/// `completed / total * 100`, rounded to two places; zero for an empty course
pub fn progress_percent(completed: i64, total: i64) -> Decimal {
    if total <= 0 {
        return Decimal::new(0, 2);
    }
    two_places(Decimal::from(completed.min(total)) * Decimal::ONE_HUNDRED / Decimal::from(total))
}

/// Whether `percent` covers every lesson of the course
pub fn is_full_progress(percent: Decimal) -> bool {
    percent >= Decimal::ONE_HUNDRED
}

impl Enrollment {
    pub fn is_completed(&self) -> bool {
        self.status == EnrollmentStatus::Completed
    }

    pub async fn exists(pool: &PgPool, student_id: i64, course_id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE student_id = $1 AND course_id = $2)",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(pool)
        .await
    }

    /// Enrolls a student in a course they are not yet enrolled in
    ///
    /// The caller checks the course is PUBLISHED. A concurrent duplicate
    /// that passes the existence check is caught by the unique constraint;
    /// both paths yield [`DomainError::DuplicateEnrollment`].
    pub async fn enroll(pool: &PgPool, student_id: i64, course_id: i64) -> Result<Self, ServiceError> {
        if Self::exists(pool, student_id, course_id).await? {
            return Err(DomainError::DuplicateEnrollment.into());
        }

        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO enrollments (student_id, course_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(pool)
        .await;

        let id = match inserted {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e, UNIQUE_CONSTRAINT) => {
                return Err(DomainError::DuplicateEnrollment.into());
            }
            Err(e) => return Err(e.into()),
        };

        info!(enrollment_id = id, student_id, course_id, "Student enrolled");

        Ok(Self::find_by_id(pool, id).await?.ok_or(sqlx::Error::RowNotFound)?)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        QUERY.find(pool, &Visibility::All, id).await
    }

    pub async fn find_visible(pool: &PgPool, visibility: &Visibility, id: i64) -> Result<Option<Self>, sqlx::Error> {
        QUERY.find(pool, visibility, id).await
    }

    pub async fn list(
        pool: &PgPool,
        visibility: &Visibility,
        filter: EnrollmentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(course) = filter.course {
                qb.push(" AND e.course_id = ").push_bind(course);
            }
            if let Some(student) = filter.student {
                qb.push(" AND e.student_id = ").push_bind(student);
            }
            if let Some(status) = filter.status {
                qb.push(" AND e.status = ").push_bind(status);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    /// Every enrollment of one student, newest first
    pub async fn for_student(pool: &PgPool, student_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        QUERY.all(pool, &Visibility::Own(student_id), &no_filter).await
    }

    /// Enrollments in the instructor's courses, optionally one course
    pub async fn for_instructor(
        pool: &PgPool,
        instructor_id: i64,
        course_id: Option<i64>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(course_id) = course_id {
                qb.push(" AND e.course_id = ").push_bind(course_id);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.all(pool, &Visibility::InstructorOf(instructor_id), filter).await
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateEnrollment) -> Result<Option<Self>, sqlx::Error> {
        if data.status.is_none() && data.progress_percent.is_none() {
            return Self::find_by_id(pool, id).await;
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE enrollments SET ");
        let mut fields = qb.separated(", ");

        if let Some(status) = data.status {
            fields.push("status = ").push_bind_unseparated(status);
            fields
                .push("completed_at = CASE WHEN ")
                .push_bind_unseparated(status)
                .push_unseparated(" = 'COMPLETED' THEN COALESCE(completed_at, NOW()) ELSE NULL END");
        }
        if let Some(progress) = data.progress_percent {
            fields.push("progress_percent = ").push_bind_unseparated(progress);
        }

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING id");

        let updated: Option<(i64,)> = qb.build_query_as().fetch_optional(pool).await?;
        match updated {
            Some(_) => Self::find_by_id(pool, id).await,
            None => Ok(None),
        }
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM enrollments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollments").fetch_one(pool).await
    }

    /// Recomputes `progress_percent` from lesson progress
    ///
    /// Runs on the caller's transaction so the progress row and the
    /// percentage commit together. An ACTIVE enrollment that reaches 100%
    /// becomes COMPLETED; DROPPED enrollments keep their status.
    pub async fn recompute_progress(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        enrollment_id: i64,
    ) -> Result<Decimal, sqlx::Error> {
        let course_id: i64 = sqlx::query_scalar("SELECT course_id FROM enrollments WHERE id = $1")
            .bind(enrollment_id)
            .fetch_one(&mut **tx)
            .await?;

        let total = Lesson::count_for_course(&mut **tx, course_id).await?;
        let completed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lesson_progress WHERE enrollment_id = $1 AND completed",
        )
        .bind(enrollment_id)
        .fetch_one(&mut **tx)
        .await?;

        let percent = progress_percent(completed, total);

        let completes = is_full_progress(percent);
        let status: EnrollmentStatus = sqlx::query_scalar(
            r#"
            UPDATE enrollments
            SET progress_percent = $1,
                status = CASE WHEN $2 AND status = 'ACTIVE' THEN 'COMPLETED' ELSE status END,
                completed_at = CASE WHEN $2 AND status = 'ACTIVE' THEN COALESCE(completed_at, NOW())
                                    ELSE completed_at END
            WHERE id = $3
            RETURNING status
            "#,
        )
        .bind(percent)
        .bind(completes)
        .bind(enrollment_id)
        .fetch_one(&mut **tx)
        .await?;

        if completes && status == EnrollmentStatus::Completed {
            info!(enrollment_id, "Enrollment completed");
        }
        Ok(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0).to_string(), "0.00");
        assert_eq!(progress_percent(0, 4).to_string(), "0.00");
        assert_eq!(progress_percent(1, 3).to_string(), "33.33");
        assert_eq!(progress_percent(2, 3).to_string(), "66.67");
        assert_eq!(progress_percent(4, 4).to_string(), "100.00");
        assert_eq!(progress_percent(9, 4).to_string(), "100.00");
    }

    #[test]
    fn test_full_progress_threshold() {
        assert!(is_full_progress(progress_percent(4, 4)));
        assert!(is_full_progress(progress_percent(1, 1)));
        assert!(!is_full_progress(progress_percent(2, 3)));
        assert!(!is_full_progress(progress_percent(0, 0)));
    }

    #[test]
    fn test_unscaled_progress_serializes_with_two_places() {
        let enrollment = Enrollment {
            id: 4,
            student_id: 2,
            student_name: "Ada Lovelace".to_string(),
            student_email: "ada@learnova.io".to_string(),
            course_id: 3,
            course_title: "Algebra".to_string(),
            status: EnrollmentStatus::Active,
            progress_percent: Decimal::ZERO,
            enrolled_at: Utc::now(),
            completed_at: None,
        };

        let json = serde_json::to_value(enrollment).unwrap();
        assert_eq!(json["progress_percent"], "0.00");
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&EnrollmentStatus::Dropped).unwrap(), "\"DROPPED\"");
        assert_eq!(EnrollmentStatus::default(), EnrollmentStatus::Active);
    }

    #[test]
    fn test_progress_serializes_as_string() {
        let enrollment = Enrollment {
            id: 1,
            student_id: 2,
            student_name: "Ada Lovelace".to_string(),
            student_email: "ada@learnova.io".to_string(),
            course_id: 3,
            course_title: "Algebra".to_string(),
            status: EnrollmentStatus::Active,
            progress_percent: Decimal::new(0, 2),
            enrolled_at: Utc::now(),
            completed_at: None,
        };

        let json = serde_json::to_value(enrollment).unwrap();
        assert_eq!(json["progress_percent"], "0.00");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["course"], 3);
        assert_eq!(json["student"], 2);
    }
}
