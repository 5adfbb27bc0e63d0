/// Attendance records for live sessions
///
/// One record per (session, student), written by the course's instructor
/// or an admin.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

pub const UNIQUE_CONSTRAINT: &str = "attendance_session_id_student_id_key";

const COLUMNS: &str = "id, session_id, student_id, status, notes";

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: "att.id, att.session_id, att.student_id, att.status, att.notes",
    from: "attendance att JOIN live_sessions ls ON ls.id = att.session_id",
    columns: ScopeColumns {
        course_id: "ls.course_id",
        student_id: Some("att.student_id"),
        system_wide: None,
    },
    id_column: "att.id",
    order_by: "ls.session_date DESC, att.id",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: i64,
    #[serde(rename = "session")]
    pub session_id: i64,
    #[serde(rename = "student")]
    pub student_id: i64,
    pub status: AttendanceStatus,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct CreateAttendance {
    pub session_id: i64,
    pub student_id: i64,
    pub status: AttendanceStatus,
    pub notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAttendance {
    pub status: Option<AttendanceStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub session: Option<i64>,
    pub student: Option<i64>,
}

impl Attendance {
    pub async fn create(pool: &PgPool, data: CreateAttendance) -> Result<Self, sqlx::Error> {
        let record = sqlx::query_as::<_, Attendance>(&format!(
            "INSERT INTO attendance (session_id, student_id, status, notes)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        ))
        .bind(data.session_id)
        .bind(data.student_id)
        .bind(data.status)
        .bind(data.notes)
        .fetch_one(pool)
        .await?;

        info!(
            record = record.id,
            session_id = record.session_id,
            student_id = record.student_id,
            "Attendance recorded"
        );
        Ok(record)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Attendance>(&format!("SELECT {COLUMNS} FROM attendance WHERE id = $1"))
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
        filter: AttendanceFilter,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(session) = filter.session {
                qb.push(" AND att.session_id = ").push_bind(session);
            }
            if let Some(student) = filter.student {
                qb.push(" AND att.student_id = ").push_bind(student);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateAttendance) -> Result<Option<Self>, sqlx::Error> {
        if data.status.is_none() && data.notes.is_none() {
            return Self::find_by_id(pool, id).await;
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE attendance SET ");
        let mut fields = qb.separated(", ");
        if let Some(status) = data.status {
            fields.push("status = ").push_bind_unseparated(status);
        }
        if let Some(notes) = data.notes {
            fields.push("notes = ").push_bind_unseparated(notes);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);

        qb.build_query_as::<Attendance>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
