/// Request extractors
///
/// `Json`, `Path` and `Query` wrap axum's extractors so that malformed
/// input is reported in the [`ApiError`] envelope instead of axum's plain
/// text rejections. `CurrentUser` and `MaybeUser` read the
/// [`AuthContext`] placed by [`crate::middleware::auth::authenticate`].
/// `Paging` reads `?page=` and `?page_size=` and builds the paginated body.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, OriginalUri},
    http::{request::Parts, Uri},
    response::{IntoResponse, Response},
};
use learnova_shared::auth::context::AuthContext;
use learnova_shared::pagination::{Page, PageParams, PageRequest};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

/// The authenticated caller; 401 when the request carries no token
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub AuthContext);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .map(CurrentUser)
            .ok_or_else(ApiError::unauthenticated)
    }
}

/// The caller if authenticated, for endpoints open to anonymous users
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<AuthContext>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthContext>().copied()))
    }
}

/// Page parameters plus the request URI for `next`/`previous` links
#[derive(Debug, Clone)]
pub struct Paging {
    pub request: PageRequest,
    uri: Uri,
}

impl Paging {
    /// Wraps a `(rows, total)` result in the paginated body
    pub fn page<T>(&self, (results, count): (Vec<T>, i64)) -> Json<Page<T>> {
        Json(Page::new(results, count, self.request, self.uri.path(), self.uri.query()))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Paging {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // nested routers strip the prefix from `parts.uri`
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());

        let axum::extract::Query(params) = axum::extract::Query::<PageParams>::try_from_uri(&uri)?;

        Ok(Paging {
            request: params.into(),
            uri,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use learnova_shared::models::user::UserRole;

    async fn paging(uri: &str) -> Result<Paging, ApiError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Paging::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_paging_defaults() {
        let paging = paging("/api/v1/courses").await.unwrap();
        assert_eq!(paging.request, PageRequest { page: 1, page_size: 20 });
    }

    #[tokio::test]
    async fn test_paging_links_keep_filters() {
        let paging = paging("/api/v1/courses?status=PUBLISHED&page=2&page_size=1").await.unwrap();
        let Json(page) = paging.page((vec!["b"], 3));

        assert_eq!(page.count, 3);
        assert_eq!(page.next.as_deref(), Some("/api/v1/courses?status=PUBLISHED&page_size=1&page=3"));
        assert_eq!(page.previous.as_deref(), Some("/api/v1/courses?status=PUBLISHED&page_size=1&page=1"));
    }

    #[tokio::test]
    async fn test_paging_rejects_garbage() {
        let err = paging("/api/v1/courses?page=abc").await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_current_user_requires_context() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let err = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);

        parts.extensions.insert(AuthContext::new(7, UserRole::Student));
        let CurrentUser(auth) = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(auth.user_id, 7);
    }
}
