/// Completion certificates
///
/// At most one certificate per enrollment. The public identifier is
/// `CERT-` followed by twelve upper-case hex digits taken from a random
/// v4 UUID. Certificates are never modified after issue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::enrollment::Enrollment;
use super::scoped::{no_filter, Filter, ScopedQuery};
use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::errors::{is_unique_violation, DomainError, ServiceError};
use crate::pagination::PageRequest;

const ENROLLMENT_CONSTRAINT: &str = "certificates_enrollment_id_key";

const SELECT: &str = "cert.id, cert.certificate_id, cert.enrollment_id, c.title AS course_title, \
     TRIM(u.first_name || ' ' || u.last_name) AS student_name, cert.issued_at";

const QUERY: ScopedQuery<'static> = ScopedQuery {
    select: SELECT,
    from: "certificates cert \
           JOIN enrollments e ON e.id = cert.enrollment_id \
           JOIN courses c ON c.id = e.course_id \
           JOIN users u ON u.id = e.student_id",
    columns: ScopeColumns {
        course_id: "e.course_id",
        student_id: Some("e.student_id"),
        system_wide: None,
    },
    id_column: "cert.id",
    order_by: "cert.issued_at DESC, cert.id DESC",
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Certificate {
    pub id: i64,
    pub certificate_id: String,
    #[serde(rename = "enrollment")]
    pub enrollment_id: i64,
    pub course_title: String,
    pub student_name: String,
    pub issued_at: DateTime<Utc>,
}

/// `CERT-` plus the first twelve hex digits of a v4 UUID, upper-cased
pub fn generate_certificate_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("CERT-{}", hex[..12].to_uppercase())
}

impl Certificate {
    /// Issues the certificate for a COMPLETED enrollment
    ///
    /// Returns the existing certificate unchanged when one was already
    /// issued; the flag tells whether a new one was created.
    pub async fn issue(pool: &PgPool, enrollment: &Enrollment) -> Result<(Self, bool), ServiceError> {
        if let Some(existing) = Self::find_by_enrollment(pool, enrollment.id).await? {
            return Ok((existing, false));
        }

        if !enrollment.is_completed() {
            return Err(DomainError::EnrollmentNotCompleted.into());
        }

        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO certificates (enrollment_id, certificate_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(enrollment.id)
        .bind(generate_certificate_id())
        .fetch_one(pool)
        .await;

        let id = match inserted {
            Ok(id) => id,
            // a concurrent issue won; hand back its certificate
            Err(e) if is_unique_violation(&e, ENROLLMENT_CONSTRAINT) => {
                let existing = Self::find_by_enrollment(pool, enrollment.id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                return Ok((existing, false));
            }
            Err(e) => return Err(e.into()),
        };

        info!(certificate = id, enrollment_id = enrollment.id, "Certificate issued");

        let certificate = QUERY
            .find(pool, &Visibility::All, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok((certificate, true))
    }

    pub async fn find_by_enrollment(pool: &PgPool, enrollment_id: i64) -> Result<Option<Self>, sqlx::Error> {
        let push = move |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push(" AND cert.enrollment_id = ").push_bind(enrollment_id);
        };
        let filter: Filter<'_> = &push;
        Ok(QUERY.all(pool, &Visibility::All, filter).await?.pop())
    }

    pub async fn find_visible(pool: &PgPool, visibility: &Visibility, id: i64) -> Result<Option<Self>, sqlx::Error> {
        QUERY.find(pool, visibility, id).await
    }

    pub async fn list(pool: &PgPool, visibility: &Visibility, page: PageRequest) -> Result<(Vec<Self>, i64), sqlx::Error> {
        QUERY.page(pool, visibility, &no_filter, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_certificate_id_format() {
        let pattern = Regex::new(r"^CERT-[0-9A-F]{12}$").unwrap();
        for _ in 0..50 {
            let id = generate_certificate_id();
            assert!(pattern.is_match(&id), "unexpected certificate id {}", id);
        }
    }

    #[test]
    fn test_certificate_ids_differ() {
        assert_ne!(generate_certificate_id(), generate_certificate_id());
    }
}
