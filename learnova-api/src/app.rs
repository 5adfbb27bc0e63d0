/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use learnova_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use learnova_shared::auth::jwt::TokenTtl;
use sqlx::PgPool;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{config::Config, middleware::auth::authenticate, routes};

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn token_ttl(&self) -> TokenTtl {
        self.config.jwt.ttl()
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Builds the complete router
///
/// ```text
/// /health
/// /api/v1/
/// ├── auth/            register, login, refresh, users, users/me
/// ├── courses/         courses, categories, modules, lessons
/// ├── enrollments/     enrollments, enroll, my-courses, lesson-progress, certificates
/// ├── assessments/     quizzes, questions, quiz-attempts, assignments, submissions
/// ├── attendance/      sessions, records
/// ├── communications/  announcements
/// └── analytics/       reports, dashboard
/// ```
///
/// Every `/api/v1` route runs behind [`authenticate`]; handlers decide
/// whether an anonymous caller is acceptable.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/courses", routes::courses::router())
        .nest("/enrollments", routes::enrollments::router())
        .nest("/assessments", routes::assessments::router())
        .nest("/attendance", routes::attendance::router())
        .nest("/communications", routes::communications::router())
        .nest("/analytics", routes::analytics::router())
        .layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", api)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}
