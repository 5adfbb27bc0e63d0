/// Course modules
///
/// Modules are ordered within a course by `order`, which is unique per
/// course. They follow the course's catalog visibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::lesson::Lesson;
use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

const COLUMNS: &str = r#"id, course_id, title, "order", created_at, updated_at"#;

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: r#"m.id, m.course_id, m.title, m."order", m.created_at, m.updated_at"#,
    from: "course_modules m",
    columns: ScopeColumns {
        course_id: "m.course_id",
        student_id: None,
        system_wide: None,
    },
    id_column: "m.id",
    order_by: r#"m.course_id, m."order", m.id"#,
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Module {
    pub id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub title: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A module with its ordered lessons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleWithLessons {
    #[serde(flatten)]
    pub module: Module,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone)]
pub struct CreateModule {
    pub course_id: i64,
    pub title: String,
    pub order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateModule {
    pub title: Option<String>,
    pub order: Option<i32>,
}

impl ModuleWithLessons {
    fn attach(modules: Vec<Module>, mut lessons: Vec<Lesson>) -> Vec<Self> {
        modules
            .into_iter()
            .map(|module| {
                let (own, rest): (Vec<Lesson>, Vec<Lesson>) =
                    lessons.drain(..).partition(|l| l.module_id == module.id);
                lessons = rest;
                ModuleWithLessons { module, lessons: own }
            })
            .collect()
    }

    /// Every module of a course, in order, with lessons
    pub async fn for_course(pool: &PgPool, course_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let modules = sqlx::query_as::<_, Module>(&format!(
            r#"SELECT {COLUMNS} FROM course_modules WHERE course_id = $1 ORDER BY "order", id"#
        ))
        .bind(course_id)
        .fetch_all(pool)
        .await?;

        let ids: Vec<i64> = modules.iter().map(|m| m.id).collect();
        let lessons = Lesson::for_modules(pool, &ids).await?;
        Ok(Self::attach(modules, lessons))
    }

    async fn with_lessons(pool: &PgPool, modules: Vec<Module>) -> Result<Vec<Self>, sqlx::Error> {
        let ids: Vec<i64> = modules.iter().map(|m| m.id).collect();
        let lessons = Lesson::for_modules(pool, &ids).await?;
        Ok(Self::attach(modules, lessons))
    }
}

impl Module {
    pub async fn create(pool: &PgPool, data: CreateModule) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Module>(&format!(
            r#"INSERT INTO course_modules (course_id, title, "order") VALUES ($1, $2, $3) RETURNING {COLUMNS}"#
        ))
        .bind(data.course_id)
        .bind(data.title)
        .bind(data.order)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Module>(&format!("SELECT {COLUMNS} FROM course_modules WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_visible(
        pool: &PgPool,
        visibility: &Visibility,
        id: i64,
    ) -> Result<Option<ModuleWithLessons>, sqlx::Error> {
        let Some(module) = QUERY.find::<Module>(pool, visibility, id).await? else {
            return Ok(None);
        };
        Ok(ModuleWithLessons::with_lessons(pool, vec![module]).await?.pop())
    }

    /// Visible modules, optionally of one course
    pub async fn list(
        pool: &PgPool,
        visibility: &Visibility,
        course_id: Option<i64>,
        page: PageRequest,
    ) -> Result<(Vec<ModuleWithLessons>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            if let Some(course_id) = course_id {
                qb.push(" AND m.course_id = ").push_bind(course_id);
            }
        };
        let filter: Filter<'_> = &push;

        let (modules, count) = QUERY.page::<Module>(pool, visibility, filter, page).await?;
        Ok((ModuleWithLessons::with_lessons(pool, modules).await?, count))
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateModule) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE course_modules SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(order) = data.order {
            qb.push(r#", "order" = "#).push_bind(order);
        }

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);
        qb.build_query_as::<Module>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM course_modules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
