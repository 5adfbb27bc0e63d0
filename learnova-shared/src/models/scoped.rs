/// List and detail queries filtered by a [`Visibility`]
///
/// Each scoped model describes its `FROM` clause, select list, scope
/// columns and ordering once as a [`ScopedQuery`]; paging, counting and
/// id lookups are shared.
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::auth::visibility::{ScopeColumns, Visibility};
use crate::pagination::PageRequest;

/// Extra `AND ...` conditions appended after the visibility predicate
pub type Filter<'f> = &'f (dyn Fn(&mut QueryBuilder<'_, Postgres>) + Sync);

/// A filter that adds nothing
pub fn no_filter(_: &mut QueryBuilder<'_, Postgres>) {}

#[derive(Debug, Clone, Copy)]
pub struct ScopedQuery<'a> {
    pub select: &'a str,
    pub from: &'a str,
    pub columns: ScopeColumns<'a>,
    /// Qualified primary key column, e.g. `q.id`
    pub id_column: &'a str,
    pub order_by: &'a str,
}

impl ScopedQuery<'_> {
    fn start(&self, head: &str, visibility: &Visibility, filter: Filter<'_>) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("{} FROM {} WHERE ", head, self.from));
        visibility.push_predicate(&mut qb, &self.columns);
        filter(&mut qb);
        qb
    }

    /// One page of visible rows plus the total visible count
    pub async fn page<T>(
        &self,
        pool: &PgPool,
        visibility: &Visibility,
        filter: Filter<'_>,
        page: PageRequest,
    ) -> Result<(Vec<T>, i64), sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        if visibility.is_nothing() {
            return Ok((Vec::new(), 0));
        }

        let (count,): (i64,) = self
            .start("SELECT COUNT(*)", visibility, filter)
            .build_query_as::<(i64,)>()
            .fetch_one(pool)
            .await?;

        let mut qb = self.start(&format!("SELECT {}", self.select), visibility, filter);
        qb.push(" ORDER BY ")
            .push(self.order_by)
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build_query_as::<T>().fetch_all(pool).await?;
        Ok((rows, count))
    }

    /// Every visible row matching `filter`, unpaged
    pub async fn all<T>(&self, pool: &PgPool, visibility: &Visibility, filter: Filter<'_>) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        if visibility.is_nothing() {
            return Ok(Vec::new());
        }

        let mut qb = self.start(&format!("SELECT {}", self.select), visibility, filter);
        qb.push(" ORDER BY ").push(self.order_by);
        qb.build_query_as::<T>().fetch_all(pool).await
    }

    /// The row with `id` if it is visible
    pub async fn find<T>(&self, pool: &PgPool, visibility: &Visibility, id: i64) -> Result<Option<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        if visibility.is_nothing() {
            return Ok(None);
        }

        let id_column = self.id_column;
        let filter = move |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push(" AND ").push(id_column).push(" = ").push_bind(id);
        };
        self.start(&format!("SELECT {}", self.select), visibility, &filter)
            .build_query_as::<T>()
            .fetch_optional(pool)
            .await
    }
}
