/// Course assignments
///
/// Course material: students see the assignments of courses they are
/// enrolled in, instructors those of their own courses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

pub const DEFAULT_MAX_POINTS: i32 = 100;

const COLUMNS: &str = "id, course_id, title, description, due_date, max_points, created_at, updated_at";

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: "a.id, a.course_id, a.title, a.description, a.due_date, a.max_points, a.created_at, a.updated_at",
    from: "assignments a",
    columns: ScopeColumns {
        course_id: "a.course_id",
        student_id: None,
        system_wide: None,
    },
    id_column: "a.id",
    order_by: "a.due_date ASC NULLS LAST, a.id",
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub max_points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAssignment {
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub max_points: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAssignment {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub max_points: Option<i32>,
}

impl Assignment {
    pub async fn create(pool: &PgPool, data: CreateAssignment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(&format!(
            "INSERT INTO assignments (course_id, title, description, due_date, max_points)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(data.course_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.due_date)
        .bind(data.max_points)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(&format!("SELECT {COLUMNS} FROM assignments WHERE id = $1"))
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
                qb.push(" AND a.course_id = ").push_bind(course_id);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateAssignment) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE assignments SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(max_points) = data.max_points {
            qb.push(", max_points = ").push_bind(max_points);
        }

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);
        qb.build_query_as::<Assignment>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
