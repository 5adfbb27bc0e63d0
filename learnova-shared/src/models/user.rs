/// User accounts and profiles
///
/// Every account has exactly one role, fixed at registration, and one
/// profile row created in the same transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username VARCHAR(150) NOT NULL UNIQUE,
///     email VARCHAR(254) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     first_name, last_name, phone, avatar, bio ...,
///     role user_role NOT NULL DEFAULT 'STUDENT',
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     ...
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use learnova_shared::models::user::{CreateUser, User, UserRole};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     username: "ada".to_string(),
///     email: "ada@learnova.io".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     first_name: "Ada".to_string(),
///     last_name: "Lovelace".to_string(),
///     role: UserRole::Student,
///     phone: String::new(),
/// }).await?;
///
/// let found = User::find_by_login(&pool, "ada@learnova.io").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::pagination::PageRequest;

/// Account role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Instructor,
    #[default]
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Instructor => "INSTRUCTOR",
            UserRole::Student => "STUDENT",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn is_instructor(&self) -> bool {
        matches!(self, UserRole::Instructor)
    }

    pub fn is_student(&self) -> bool {
        matches!(self, UserRole::Student)
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, role, phone, \
     avatar, bio, is_verified, is_active, last_login_at, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,

    /// Argon2id PHC string; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub phone: String,
    pub avatar: Option<String>,
    pub bio: String,
    pub is_verified: bool,

    #[serde(skip_serializing, default)]
    pub is_active: bool,

    #[serde(skip_serializing, default)]
    pub last_login_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "First Last", trimmed; empty when neither is set
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

pub fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name, last_name).trim().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    #[serde(skip_serializing, default)]
    pub user_id: i64,
    pub organization: String,
    pub department: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user together with their profile, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub phone: String,
}

/// Editable account fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub avatar: Option<Option<String>>,
    pub bio: Option<String>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.avatar.is_none()
            && self.bio.is_none()
    }
}

impl User {
    /// Inserts the account and its empty profile in one transaction
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<UserDetail, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, first_name, last_name, role, phone)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.role)
        .bind(data.phone)
        .fetch_one(&mut *tx)
        .await?;

        let profile = sqlx::query_as::<_, UserProfile>(
            "INSERT INTO user_profiles (user_id) VALUES ($1)
             RETURNING user_id, organization, department, timezone, created_at, updated_at",
        )
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(UserDetail {
            user,
            profile: Some(profile),
        })
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Looks a user up by username, falling back to email
    pub async fn find_by_login(pool: &PgPool, login: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE username = $1 OR LOWER(email) = LOWER($1)
             ORDER BY (username = $1) DESC
             LIMIT 1"
        ))
        .bind(login)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<UserDetail>, sqlx::Error> {
        let Some(user) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let profile = UserProfile::find(pool, id).await?;
        Ok(Some(UserDetail { user, profile }))
    }

    pub async fn list(pool: &PgPool, page: PageRequest) -> Result<(Vec<UserDetail>, i64), sqlx::Error> {
        let count = Self::count(pool).await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok((Self::with_profiles(pool, users).await?, count))
    }

    /// Users with the given ids, each with their profile
    pub async fn find_details(pool: &PgPool, ids: &[i64]) -> Result<Vec<UserDetail>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Self::with_profiles(pool, users).await
    }

    async fn with_profiles(pool: &PgPool, users: Vec<User>) -> Result<Vec<UserDetail>, sqlx::Error> {
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        let mut profiles = UserProfile::find_many(pool, &ids).await?;

        Ok(users
            .into_iter()
            .map(|user| {
                let profile = profiles
                    .iter()
                    .position(|p| p.user_id == user.id)
                    .map(|i| profiles.swap_remove(i));
                UserDetail { user, profile }
            })
            .collect())
    }

    /// Applies the present fields of `data`; returns `None` if the user is gone
    pub async fn update(pool: &PgPool, id: i64, data: UpdateUser) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(username) = data.username {
            qb.push(", username = ").push_bind(username);
        }
        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(first_name) = data.first_name {
            qb.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            qb.push(", last_name = ").push_bind(last_name);
        }
        if let Some(phone) = data.phone {
            qb.push(", phone = ").push_bind(phone);
        }
        if let Some(avatar) = data.avatar {
            qb.push(", avatar = ").push_bind(avatar);
        }
        if let Some(bio) = data.bio {
            qb.push(", bio = ").push_bind(bio);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        qb.build_query_as::<User>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }

    pub async fn count_by_role(pool: &PgPool, role: UserRole) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(pool)
            .await
    }
}

const PROFILE_COLUMNS: &str = "user_id, organization, department, timezone, created_at, updated_at";

impl UserProfile {
    pub async fn find(pool: &PgPool, user_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_many(pool: &PgPool, user_ids: &[i64]) -> Result<Vec<Self>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = ANY($1)"
        ))
        .bind(user_ids)
        .fetch_all(pool)
        .await
    }
}
