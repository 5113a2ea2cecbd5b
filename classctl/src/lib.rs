//! # classctl: Lesson Scheduling and Attendance Billing
//!
//! `classctl` is the back office of a language school. It books lessons between teachers and
//! students, refuses double bookings, and settles money when attendance is marked: students are
//! charged per lesson from a prepaid balance and teachers are paid per student who attended.
//!
//! ## Overview
//!
//! Every balance change is a row in an append-only ledger, written in the same transaction that
//! updates the cached balance on the user. Attendance marks are idempotent: marking a student
//! present twice charges them once, and moving them back to pending (or to an excused absence)
//! refunds the outstanding charge. A student who cannot cover the price is still marked, just not
//! charged, and gets an insufficient-funds notice instead of the request failing.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); all persistence is PostgreSQL
//! through `sqlx`.
//!
//! ### Request Flow
//!
//! Requests to `/api/v1/*` carry the caller's email in a header set by a trusted auth proxy
//! (`x-classctl-user` by default). The [`auth`] extractor resolves it to a user, the handler
//! checks role-based permissions, opens a transaction and hands it to the [`scheduling`] services,
//! which talk to the database through the repositories in [`db::handlers`].
//!
//! ### Core Components
//!
//! - [`api`]: route handlers and request/response models
//! - [`auth`]: proxy-header authentication and permission checks
//! - [`scheduling`]: conflict detection, recurrence expansion, lesson lifecycle and settlement
//! - [`db`]: repositories, models and migrations
//! - [`config`]: YAML plus `CLASSCTL_`-prefixed environment configuration
//! - [`telemetry`]: tracing setup with optional OTLP export
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use classctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = classctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     classctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations in `migrations/` run automatically on startup. To run them by hand:
//!
//! ```no_run
//! # async fn example(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! classctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod metrics;
mod openapi;
pub mod scheduling;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::openapi::ApiDoc;
use axum::{
    Router,
    routing::{get, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

pub use types::{GroupId, LessonId, LessonTypeId, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the classctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to the configured database and bring the schema up to date
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool_settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(Duration::from_secs(pool_settings.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}

/// Render the default prometheus registry, where the settlement counters live
fn render_default_registry() -> String {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Build the application router with all endpoints and middleware
#[instrument(skip_all)]
pub async fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        // Lessons
        .route(
            "/lessons",
            get(api::handlers::lessons::list_lessons).post(api::handlers::lessons::create_lesson),
        )
        .route("/lessons/batch", post(api::handlers::lessons::create_recurring_lessons))
        .route(
            "/lessons/{lesson_id}",
            get(api::handlers::lessons::get_lesson)
                .patch(api::handlers::lessons::update_lesson)
                .delete(api::handlers::lessons::delete_lesson),
        )
        .route("/lessons/{lesson_id}/cancel", post(api::handlers::lessons::cancel_lesson))
        // Attendance
        .route(
            "/lessons/{lesson_id}/attendance",
            put(api::handlers::attendance::set_attendance_bulk),
        )
        .route(
            "/lessons/{lesson_id}/attendance/{student_id}",
            put(api::handlers::attendance::set_attendance),
        )
        // Balances and ledger
        .route("/users/{user_id}/balance", get(api::handlers::transactions::get_balance))
        .route(
            "/users/{user_id}/balance/top-ups",
            post(api::handlers::transactions::create_top_up),
        )
        .route(
            "/users/{user_id}/transactions",
            get(api::handlers::transactions::list_transactions),
        )
        // Notifications
        .route("/notifications", get(api::handlers::notifications::list_notifications))
        .route(
            "/notifications/{id}/read",
            post(api::handlers::notifications::mark_notification_read),
        )
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/docs"));

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

        // HTTP metrics from axum-prometheus followed by the settlement counters
        router = router
            .route(
                "/internal/metrics",
                get(|| async move {
                    let mut metrics = metric_handle.render();
                    metrics.push_str(&render_default_registry());
                    metrics
                }),
            )
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance, connecting to the configured database
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on an existing pool (migrations still run), or connect if none given
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting classctl with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&app_state).await?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "classctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
