/// Stored reports and dashboard aggregates
///
/// Reports are admin-managed snapshots with free-form JSON parameters.
/// The dashboard numbers are recomputed on every request.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::category::Category;
use super::course::Course;
use super::enrollment::{Enrollment, EnrollmentStatus};
use super::user::{User, UserDetail, UserRole};
use crate::pagination::PageRequest;

const COLUMNS: &str = "id, report_type, title, params, generated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Enrollment,
    Completion,
    Revenue,
    Performance,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: i64,
    pub report_type: ReportType,
    pub title: String,
    pub params: JsonValue,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateReport {
    pub report_type: ReportType,
    pub title: String,
    pub params: JsonValue,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub report_type: Option<ReportType>,
    pub title: Option<String>,
    pub params: Option<JsonValue>,
}

impl Report {
    pub async fn create(pool: &PgPool, data: CreateReport) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            "INSERT INTO reports (report_type, title, params) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(data.report_type)
        .bind(data.title)
        .bind(data.params)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!("SELECT {COLUMNS} FROM reports WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, page: PageRequest) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports")
            .fetch_one(pool)
            .await?;

        let reports = sqlx::query_as::<_, Report>(&format!(
            "SELECT {COLUMNS} FROM reports ORDER BY generated_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok((reports, count))
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateReport) -> Result<Option<Self>, sqlx::Error> {
        if data.report_type.is_none() && data.title.is_none() && data.params.is_none() {
            return Self::find_by_id(pool, id).await;
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE reports SET ");
        let mut fields = qb.separated(", ");
        if let Some(report_type) = data.report_type {
            fields.push("report_type = ").push_bind_unseparated(report_type);
        }
        if let Some(title) = data.title {
            fields.push("title = ").push_bind_unseparated(title);
        }
        if let Some(params) = data.params {
            fields.push("params = ").push_bind_unseparated(params);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);

        qb.build_query_as::<Report>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Platform-wide totals for the admin dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub total_courses: i64,
    pub total_students: i64,
    pub total_instructors: i64,
    pub total_enrollments: i64,
    pub total_categories: i64,
}

impl Overview {
    pub async fn compute(pool: &PgPool) -> Result<Self, sqlx::Error> {
        Ok(Overview {
            total_courses: Course::count(pool).await?,
            total_students: User::count_by_role(pool, UserRole::Student).await?,
            total_instructors: User::count_by_role(pool, UserRole::Instructor).await?,
            total_enrollments: Enrollment::count(pool).await?,
            total_categories: Category::count(pool).await?,
        })
    }
}

/// One enrollment in an instructor's courses, with the student's account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub student: UserDetail,
    pub course_id: i64,
    pub course_title: String,
    /// Plain number rather than the decimal string used elsewhere
    pub progress_percent: f64,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

impl RosterEntry {
    fn new(enrollment: Enrollment, student: UserDetail) -> Self {
        RosterEntry {
            student,
            course_id: enrollment.course_id,
            course_title: enrollment.course_title,
            progress_percent: enrollment.progress_percent.to_f64().unwrap_or_default(),
            status: enrollment.status,
            enrolled_at: enrollment.enrolled_at,
        }
    }

    /// Students enrolled in `instructor_id`'s courses, optionally one course
    pub async fn for_instructor(
        pool: &PgPool,
        instructor_id: i64,
        course_id: Option<i64>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let enrollments = Enrollment::for_instructor(pool, instructor_id, course_id).await?;

        let mut student_ids: Vec<i64> = enrollments.iter().map(|e| e.student_id).collect();
        student_ids.sort_unstable();
        student_ids.dedup();
        let students = User::find_details(pool, &student_ids).await?;

        Ok(enrollments
            .into_iter()
            .filter_map(|enrollment| {
                let student = students.iter().find(|s| s.user.id == enrollment.student_id)?.clone();
                Some(RosterEntry::new(enrollment, student))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_report_type_wire_format() {
        assert_eq!(serde_json::to_value(ReportType::Performance).unwrap(), "PERFORMANCE");
        let parsed: ReportType = serde_json::from_str("\"REVENUE\"").unwrap();
        assert_eq!(parsed, ReportType::Revenue);
    }

    #[test]
    fn test_roster_progress_is_a_number() {
        let now = Utc::now();
        let enrollment = Enrollment {
            id: 1,
            student_id: 2,
            student_name: "Ada Lovelace".to_string(),
            student_email: "ada@learnova.io".to_string(),
            course_id: 3,
            course_title: "Calculus".to_string(),
            status: EnrollmentStatus::Active,
            progress_percent: Decimal::new(3333, 2),
            enrolled_at: now,
            completed_at: None,
        };
        let student = UserDetail {
            user: User {
                id: 2,
                username: "ada".to_string(),
                email: "ada@learnova.io".to_string(),
                password_hash: String::new(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                role: UserRole::Student,
                phone: String::new(),
                avatar: None,
                bio: String::new(),
                is_verified: false,
                is_active: true,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            },
            profile: None,
        };

        let json = serde_json::to_value(RosterEntry::new(enrollment, student)).unwrap();
        assert_eq!(json["progress_percent"], 33.33);
        assert_eq!(json["course_id"], 3);
        assert_eq!(json["student"]["username"], "ada");
        assert!(json["student"].get("password_hash").is_none());
    }
}
