/// Lessons within a module
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lesson_content_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonContentType {
    Video,
    Pdf,
    Text,
    Link,
}

const COLUMNS: &str =
    r#"id, module_id, title, content_type, content_url, duration_minutes, "order", created_at, updated_at"#;

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: r#"l.id, l.module_id, l.title, l.content_type, l.content_url, l.duration_minutes, l."order", l.created_at, l.updated_at"#,
    from: "course_lessons l JOIN course_modules m ON m.id = l.module_id",
    columns: ScopeColumns {
        course_id: "m.course_id",
        student_id: None,
        system_wide: None,
    },
    id_column: "l.id",
    order_by: r#"l.module_id, l."order", l.id"#,
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lesson {
    pub id: i64,
    #[serde(rename = "module")]
    pub module_id: i64,
    pub title: String,
    pub content_type: LessonContentType,
    pub content_url: String,
    pub duration_minutes: i32,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateLesson {
    pub module_id: i64,
    pub title: String,
    pub content_type: LessonContentType,
    pub content_url: String,
    pub duration_minutes: i32,
    pub order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateLesson {
    pub title: Option<String>,
    pub content_type: Option<LessonContentType>,
    pub content_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub order: Option<i32>,
}

impl Lesson {
    pub async fn create(pool: &PgPool, data: CreateLesson) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Lesson>(&format!(
            r#"INSERT INTO course_lessons (module_id, title, content_type, content_url, duration_minutes, "order")
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {COLUMNS}"#
        ))
        .bind(data.module_id)
        .bind(data.title)
        .bind(data.content_type)
        .bind(data.content_url)
        .bind(data.duration_minutes)
        .bind(data.order)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lesson>(&format!("SELECT {COLUMNS} FROM course_lessons WHERE id = $1"))
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
        module_id: Option<i64>,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(module_id) = module_id {
                qb.push(" AND l.module_id = ").push_bind(module_id);
            }
        };
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    /// Lessons of the given modules, ordered within each module
    pub async fn for_modules(pool: &PgPool, module_ids: &[i64]) -> Result<Vec<Self>, sqlx::Error> {
        if module_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Lesson>(&format!(
            r#"SELECT {COLUMNS} FROM course_lessons WHERE module_id = ANY($1) ORDER BY module_id, "order", id"#
        ))
        .bind(module_ids)
        .fetch_all(pool)
        .await
    }

    /// Course the lesson belongs to
    pub async fn course_id(pool: &PgPool, lesson_id: i64) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT m.course_id FROM course_lessons l JOIN course_modules m ON m.id = l.module_id WHERE l.id = $1",
        )
        .bind(lesson_id)
        .fetch_optional(pool)
        .await
    }

    /// Number of lessons across every module of a course
    pub async fn count_for_course<'e, E>(executor: E, course_id: i64) -> Result<i64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM course_lessons l JOIN course_modules m ON m.id = l.module_id WHERE m.course_id = $1",
        )
        .bind(course_id)
        .fetch_one(executor)
        .await
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateLesson) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE course_lessons SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(content_type) = data.content_type {
            qb.push(", content_type = ").push_bind(content_type);
        }
        if let Some(content_url) = data.content_url {
            qb.push(", content_url = ").push_bind(content_url);
        }
        if let Some(duration_minutes) = data.duration_minutes {
            qb.push(", duration_minutes = ").push_bind(duration_minutes);
        }
        if let Some(order) = data.order {
            qb.push(r#", "order" = "#).push_bind(order);
        }

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);
        qb.build_query_as::<Lesson>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM course_lessons WHERE id = $1")
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
    fn test_content_type_wire_format() {
        assert_eq!(serde_json::to_string(&LessonContentType::Pdf).unwrap(), "\"PDF\"");
        let parsed: LessonContentType = serde_json::from_str("\"LINK\"").unwrap();
        assert_eq!(parsed, LessonContentType::Link);
    }
}
