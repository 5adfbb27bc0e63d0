/// Scheduled live sessions of a course

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

pub const DEFAULT_DURATION_MINUTES: i32 = 60;

const COLUMNS: &str = "id, course_id, title, session_date, duration_minutes, meeting_url, created_at, updated_at";

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: "ls.id, ls.course_id, ls.title, ls.session_date, ls.duration_minutes, ls.meeting_url, \
             ls.created_at, ls.updated_at",
    from: "live_sessions ls",
    columns: ScopeColumns {
        course_id: "ls.course_id",
        student_id: None,
        system_wide: None,
    },
    id_column: "ls.id",
    order_by: "ls.session_date DESC, ls.id DESC",
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LiveSession {
    pub id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub title: String,
    pub session_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub meeting_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateLiveSession {
    pub course_id: i64,
    pub title: String,
    pub session_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub meeting_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateLiveSession {
    pub title: Option<String>,
    pub session_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub meeting_url: Option<String>,
}

impl LiveSession {
    pub async fn create(pool: &PgPool, data: CreateLiveSession) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, LiveSession>(&format!(
            "INSERT INTO live_sessions (course_id, title, session_date, duration_minutes, meeting_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(data.course_id)
        .bind(data.title)
        .bind(data.session_date)
        .bind(data.duration_minutes)
        .bind(data.meeting_url)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LiveSession>(&format!("SELECT {COLUMNS} FROM live_sessions WHERE id = $1"))
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
        course_id: Option<i64>,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(course_id) = course_id {
                qb.push(" AND ls.course_id = ").push_bind(course_id);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateLiveSession) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE live_sessions SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(session_date) = data.session_date {
            qb.push(", session_date = ").push_bind(session_date);
        }
        if let Some(duration) = data.duration_minutes {
            qb.push(", duration_minutes = ").push_bind(duration);
        }
        if let Some(meeting_url) = data.meeting_url {
            qb.push(", meeting_url = ").push_bind(meeting_url);
        }

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);
        qb.build_query_as::<LiveSession>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM live_sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
