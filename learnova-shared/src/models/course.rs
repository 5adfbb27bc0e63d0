/// Courses
///
/// A course belongs to one instructor and optionally one category. Only
/// PUBLISHED courses are visible to students and anonymous callers; the
/// rule itself lives in [`crate::auth::visibility`].
///
/// List responses use [`CourseSummary`]; detail responses use
/// [`CourseDetail`], which nests the ordered modules and their lessons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::module::ModuleWithLessons;
use super::scoped::{Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "course_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    #[default]
    Draft,
    Pending,
    Published,
    Archived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "course_audience", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseAudience {
    #[default]
    Student,
    Kids,
}

pub const DEFAULT_LEVEL: &str = "Beginner";

const SELECT: &str = "c.id, c.title, c.slug, c.description, c.category_id, cat.name AS category_name, \
     c.instructor_id, TRIM(u.first_name || ' ' || u.last_name) AS instructor_name, c.status, c.audience, \
     c.class_range, c.thumbnail, c.duration_hours, c.level, c.max_students, c.created_at, c.updated_at";

const FROM: &str = "courses c \
     LEFT JOIN course_categories cat ON cat.id = c.category_id \
     JOIN users u ON u.id = c.instructor_id";

pub(crate) const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: SELECT,
    from: FROM,
    columns: ScopeColumns {
        course_id: "c.id",
        student_id: None,
        system_wide: None,
    },
    id_column: "c.id",
    order_by: "c.created_at DESC, c.id DESC",
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    #[serde(rename = "category")]
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    #[serde(rename = "instructor")]
    pub instructor_id: i64,
    pub instructor_name: String,
    pub status: CourseStatus,
    pub audience: CourseAudience,
    pub class_range: String,
    pub thumbnail: Option<String>,
    pub duration_hours: i32,
    pub level: String,
    pub max_students: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact list representation
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CourseSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category_name: Option<String>,
    pub instructor_name: String,
    pub status: CourseStatus,
    pub audience: CourseAudience,
    pub class_range: String,
    pub thumbnail: Option<String>,
    pub duration_hours: i32,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub modules: Vec<ModuleWithLessons>,
}

/// Query-string filters for the course list
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CourseFilter {
    pub status: Option<CourseStatus>,
    pub category: Option<i64>,
    pub instructor: Option<i64>,
    pub audience: Option<CourseAudience>,
}

impl CourseFilter {
    fn push(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(status) = self.status {
            qb.push(" AND c.status = ").push_bind(status);
        }
        if let Some(category) = self.category {
            qb.push(" AND c.category_id = ").push_bind(category);
        }
        if let Some(instructor) = self.instructor {
            qb.push(" AND c.instructor_id = ").push_bind(instructor);
        }
        if let Some(audience) = self.audience {
            qb.push(" AND c.audience = ").push_bind(audience);
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateCourse {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub instructor_id: i64,
    pub status: CourseStatus,
    pub audience: CourseAudience,
    pub class_range: String,
    pub thumbnail: Option<String>,
    pub duration_hours: i32,
    pub level: String,
    pub max_students: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCourse {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Option<i64>>,
    pub instructor_id: Option<i64>,
    pub status: Option<CourseStatus>,
    pub audience: Option<CourseAudience>,
    pub class_range: Option<String>,
    pub thumbnail: Option<Option<String>>,
    pub duration_hours: Option<i32>,
    pub level: Option<String>,
    pub max_students: Option<Option<i32>>,
}

impl Course {
    pub fn is_published(&self) -> bool {
        self.status == CourseStatus::Published
    }

    pub async fn create(pool: &PgPool, data: CreateCourse) -> Result<Self, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO courses (title, slug, description, category_id, instructor_id, status, audience,
                                  class_range, thumbnail, duration_hours, level, max_students)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING id",
        )
        .bind(data.title)
        .bind(data.slug)
        .bind(data.description)
        .bind(data.category_id)
        .bind(data.instructor_id)
        .bind(data.status)
        .bind(data.audience)
        .bind(data.class_range)
        .bind(data.thumbnail)
        .bind(data.duration_hours)
        .bind(data.level)
        .bind(data.max_students)
        .fetch_one(pool)
        .await?;

        Self::find_by_id(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Unscoped lookup, for permission checks on child objects
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        QUERY.find(pool, &Visibility::All, id).await
    }

    /// A PUBLISHED course, or `None`
    pub async fn find_published(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        QUERY.find(pool, &Visibility::PublishedOnly, id).await
    }

    pub async fn find_visible(pool: &PgPool, visibility: &Visibility, id: i64) -> Result<Option<Self>, sqlx::Error> {
        QUERY.find(pool, visibility, id).await
    }

    /// Detail view with ordered modules and lessons
    pub async fn find_detail(
        pool: &PgPool,
        visibility: &Visibility,
        id: i64,
    ) -> Result<Option<CourseDetail>, sqlx::Error> {
        let Some(course) = Self::find_visible(pool, visibility, id).await? else {
            return Ok(None);
        };
        let modules = ModuleWithLessons::for_course(pool, course.id).await?;
        Ok(Some(CourseDetail { course, modules }))
    }

    pub async fn list(
        pool: &PgPool,
        visibility: &Visibility,
        filter: CourseFilter,
        page: PageRequest,
    ) -> Result<(Vec<CourseSummary>, i64), sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| filter.push(qb);
        let filter: Filter<'_> = &push;
        QUERY.page(pool, visibility, filter, page).await
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateCourse) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE courses SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(slug) = data.slug {
            qb.push(", slug = ").push_bind(slug);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(category_id) = data.category_id {
            qb.push(", category_id = ").push_bind(category_id);
        }
        if let Some(instructor_id) = data.instructor_id {
            qb.push(", instructor_id = ").push_bind(instructor_id);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(audience) = data.audience {
            qb.push(", audience = ").push_bind(audience);
        }
        if let Some(class_range) = data.class_range {
            qb.push(", class_range = ").push_bind(class_range);
        }
        if let Some(thumbnail) = data.thumbnail {
            qb.push(", thumbnail = ").push_bind(thumbnail);
        }
        if let Some(duration_hours) = data.duration_hours {
            qb.push(", duration_hours = ").push_bind(duration_hours);
        }
        if let Some(level) = data.level {
            qb.push(", level = ").push_bind(level);
        }
        if let Some(max_students) = data.max_students {
            qb.push(", max_students = ").push_bind(max_students);
        }

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING id");

        let updated: Option<(i64,)> = qb.build_query_as().fetch_optional(pool).await?;
        match updated {
            Some(_) => Self::find_by_id(pool, id).await,
            None => Ok(None),
        }
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM courses").fetch_one(pool).await
    }

    /// Instructor of the course, if the course exists
    pub async fn instructor_of(pool: &PgPool, id: i64) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT instructor_id FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
