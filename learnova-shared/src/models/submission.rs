/// Assignment submissions and grading
///
/// One submission per (assignment, student). Students may change their
/// text or file until the submission is graded; grade and feedback are
/// only written by [`Submission::grade`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::errors::{DomainError, ServiceError};
use crate::pagination::PageRequest;

pub const UNIQUE_CONSTRAINT: &str = "assignment_submissions_assignment_id_student_id_key";

const COLUMNS: &str =
    "id, assignment_id, student_id, file, text_submission, grade, feedback, submitted_at, graded_at";

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: "s.id, s.assignment_id, s.student_id, s.file, s.text_submission, s.grade, s.feedback, \
             s.submitted_at, s.graded_at",
    from: "assignment_submissions s JOIN assignments a ON a.id = s.assignment_id",
    columns: ScopeColumns {
        course_id: "a.course_id",
        student_id: Some("s.student_id"),
        system_wide: None,
    },
    id_column: "s.id",
    order_by: "s.submitted_at DESC, s.id DESC",
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Submission {
    pub id: i64,
    #[serde(rename = "assignment")]
    pub assignment_id: i64,
    #[serde(rename = "student")]
    pub student_id: i64,
    pub file: Option<String>,
    pub text_submission: String,
    #[serde(serialize_with = "crate::models::fixed_point::serialize_option")]
    pub grade: Option<Decimal>,
    pub feedback: String,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateSubmission {
    pub assignment_id: i64,
    pub student_id: i64,
    pub file: Option<String>,
    pub text_submission: String,
}

/// Fields a student may change before grading
#[derive(Debug, Clone, Default)]
pub struct UpdateSubmission {
    pub file: Option<Option<String>>,
    pub text_submission: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub assignment: Option<i64>,
    pub student: Option<i64>,
}

/// Whether `grade` lies in `0..=max_points` and fits the grade column
pub fn grade_in_range(grade: Decimal, max_points: i32) -> bool {
    grade >= Decimal::ZERO && grade <= Decimal::from(max_points) && grade <= Decimal::new(99999, 2)
}

impl Submission {
    pub fn is_graded(&self) -> bool {
        self.graded_at.is_some()
    }

    pub async fn create(pool: &PgPool, data: CreateSubmission) -> Result<Self, sqlx::Error> {
        let submission = sqlx::query_as::<_, Submission>(&format!(
            "INSERT INTO assignment_submissions (assignment_id, student_id, file, text_submission)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        ))
        .bind(data.assignment_id)
        .bind(data.student_id)
        .bind(data.file)
        .bind(data.text_submission)
        .fetch_one(pool)
        .await?;

        info!(
            submission = submission.id,
            assignment_id = submission.assignment_id,
            student_id = submission.student_id,
            "Assignment submitted"
        );
        Ok(submission)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM assignment_submissions WHERE id = $1"))
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
        filter: SubmissionFilter,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(assignment) = filter.assignment {
                qb.push(" AND s.assignment_id = ").push_bind(assignment);
            }
            if let Some(student) = filter.student {
                qb.push(" AND s.student_id = ").push_bind(student);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    /// Edits the student's work; refused once graded
    pub async fn update(pool: &PgPool, id: i64, data: UpdateSubmission) -> Result<Option<Self>, ServiceError> {
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        if current.is_graded() {
            return Err(DomainError::AlreadyGraded.into());
        }
        if data.file.is_none() && data.text_submission.is_none() {
            return Ok(Some(current));
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE assignment_submissions SET ");
        let mut fields = qb.separated(", ");
        if let Some(file) = data.file {
            fields.push("file = ").push_bind_unseparated(file);
        }
        if let Some(text) = data.text_submission {
            fields.push("text_submission = ").push_bind_unseparated(text);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND graded_at IS NULL RETURNING ")
            .push(COLUMNS);

        match qb.build_query_as::<Submission>().fetch_optional(pool).await? {
            Some(updated) => Ok(Some(updated)),
            // graded between the read and the write
            None => Err(DomainError::AlreadyGraded.into()),
        }
    }

    /// Sets grade, feedback and `graded_at`; a submission is graded once
    ///
    /// The caller checks the grade against the assignment's `max_points`
    /// with [`grade_in_range`].
    pub async fn grade(pool: &PgPool, id: i64, grade: Decimal, feedback: String) -> Result<Option<Self>, ServiceError> {
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        if current.is_graded() {
            return Err(DomainError::AlreadyGraded.into());
        }

        let graded = sqlx::query_as::<_, Submission>(&format!(
            "UPDATE assignment_submissions
             SET grade = $2, feedback = $3, graded_at = NOW()
             WHERE id = $1 AND graded_at IS NULL
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(grade)
        .bind(feedback)
        .fetch_optional(pool)
        .await?;

        match graded {
            Some(submission) => {
                info!(submission = submission.id, grade = %grade, "Submission graded");
                Ok(Some(submission))
            }
            // graded concurrently
            None => Err(DomainError::AlreadyGraded.into()),
        }
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM assignment_submissions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_range() {
        assert!(grade_in_range(Decimal::ZERO, 100));
        assert!(grade_in_range(Decimal::new(10000, 2), 100));
        assert!(grade_in_range(Decimal::new(8550, 2), 100));
        assert!(!grade_in_range(Decimal::new(10001, 2), 100));
        assert!(!grade_in_range(Decimal::new(-1, 0), 100));
    }

    #[test]
    fn test_grade_must_fit_the_column() {
        assert!(grade_in_range(Decimal::new(99999, 2), 5000));
        assert!(!grade_in_range(Decimal::new(1500, 0), 5000));
    }

    #[test]
    fn test_zero_grade_keeps_two_places() {
        let submission = Submission {
            id: 5,
            assignment_id: 2,
            student_id: 3,
            file: None,
            text_submission: String::new(),
            grade: Some(Decimal::ZERO),
            feedback: String::new(),
            submitted_at: Utc::now(),
            graded_at: Some(Utc::now()),
        };

        let json = serde_json::to_value(submission).unwrap();
        assert_eq!(json["grade"], "0.00");
    }

    #[test]
    fn test_submission_json_shape() {
        let submission = Submission {
            id: 1,
            assignment_id: 2,
            student_id: 3,
            file: None,
            text_submission: "answer".to_string(),
            grade: Some(Decimal::new(9050, 2)),
            feedback: String::new(),
            submitted_at: Utc::now(),
            graded_at: Some(Utc::now()),
        };

        assert!(submission.is_graded());
        let json = serde_json::to_value(submission).unwrap();
        assert_eq!(json["assignment"], 2);
        assert_eq!(json["student"], 3);
        assert_eq!(json["grade"], "90.50");
        assert!(json["file"].is_null());
    }
}
