/// Course categories
///
/// Categories form an optional tree through `parent_id`. Deleting a
/// category cascades to its children and clears `category_id` on courses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::pagination::PageRequest;

const COLUMNS: &str = "id, name, slug, description, class_range, parent_id, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub class_range: String,
    #[serde(rename = "parent")]
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCategory {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub class_range: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub class_range: Option<String>,
    pub parent_id: Option<Option<i64>>,
}

impl Category {
    pub async fn create(pool: &PgPool, data: CreateCategory) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO course_categories (name, slug, description, class_range, parent_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(data.name)
        .bind(data.slug)
        .bind(data.description)
        .bind(data.class_range)
        .bind(data.parent_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!("SELECT {COLUMNS} FROM course_categories WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, page: PageRequest) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let count = Self::count(pool).await?;
        let rows = sqlx::query_as::<_, Category>(&format!(
            "SELECT {COLUMNS} FROM course_categories ORDER BY name, id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok((rows, count))
    }

    pub async fn update(pool: &PgPool, id: i64, data: UpdateCategory) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE course_categories SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(slug) = data.slug {
            qb.push(", slug = ").push_bind(slug);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(class_range) = data.class_range {
            qb.push(", class_range = ").push_bind(class_range);
        }
        if let Some(parent_id) = data.parent_id {
            qb.push(", parent_id = ").push_bind(parent_id);
        }

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING ").push(COLUMNS);
        qb.build_query_as::<Category>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM course_categories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM course_categories")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_serialized_as_parent() {
        let now = Utc::now();
        let category = Category {
            id: 1,
            name: "School Tuition".to_string(),
            slug: "school-tuition".to_string(),
            description: String::new(),
            class_range: "Class 3 - 12".to_string(),
            parent_id: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(category).unwrap();
        assert!(json["parent"].is_null());
        assert!(json.get("parent_id").is_none());
    }
}
