/// Course and system-wide announcements
///
/// COURSE announcements belong to one course. SYSTEM announcements have no
/// course and are visible to every student. Pinned announcements sort first,
/// then newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: "a.id, a.course_id, a.author_id, TRIM(u.first_name || ' ' || u.last_name) AS author_name, \
             a.title, a.content, a.scope, a.is_pinned, a.created_at, a.updated_at",
    from: "announcements a JOIN users u ON u.id = a.author_id",
    columns: ScopeColumns {
        course_id: "a.course_id",
        student_id: None,
        system_wide: Some("a.scope = 'SYSTEM'"),
    },
    id_column: "a.id",
    order_by: "a.is_pinned DESC, a.created_at DESC, a.id DESC",
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "announcement_scope", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnouncementScope {
    #[default]
    Course,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Announcement {
    pub id: i64,
    #[serde(rename = "course")]
    pub course_id: Option<i64>,
    #[serde(rename = "author")]
    pub author_id: i64,
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub scope: AnnouncementScope,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAnnouncement {
    pub course_id: Option<i64>,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub scope: AnnouncementScope,
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAnnouncement {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_pinned: Option<bool>,
}

impl Announcement {
    pub fn is_system(&self) -> bool {
        self.scope == AnnouncementScope::System
    }

    pub async fn create(pool: &PgPool, data: CreateAnnouncement) -> Result<Self, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO announcements (course_id, author_id, title, content, scope, is_pinned)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(data.course_id)
        .bind(data.author_id)
        .bind(data.title)
        .bind(data.content)
        .bind(data.scope)
        .bind(data.is_pinned)
        .fetch_one(pool)
        .await?;

        info!(announcement = id, author_id = data.author_id, scope = ?data.scope, "Announcement posted");

        Self::find_by_id(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
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

    pub async fn update(pool: &PgPool, id: i64, data: UpdateAnnouncement) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE announcements SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(content) = data.content {
            qb.push(", content = ").push_bind(content);
        }
        if let Some(is_pinned) = data.is_pinned {
            qb.push(", is_pinned = ").push_bind(is_pinned);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING id");

        let updated: Option<(i64,)> = qb.build_query_as().fetch_optional(pool).await?;
        match updated {
            Some(_) => Self::find_by_id(pool, id).await,
            None => Ok(None),
        }
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
