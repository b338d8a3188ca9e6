//! # bizctl: deployment store and sign-in backend
//!
//! `bizctl` keeps one deployment record per business and fronts it with a small web surface:
//!
//! - **Deployment procedures** at `/api/trpc/{procedure}` ([`rpc`]): create, read, update, delete
//!   and list deployments keyed by business id. Every deployment procedure requires a session.
//! - **Sign-in** at `/api/auth/*` ([`auth`]): OAuth with Google, Microsoft and Apple. A successful
//!   callback upserts the user by email and sets a signed session cookie.
//! - **Username recovery** at `POST /api/auth/forgot-username` ([`api`]): emails the username
//!   registered for an address, with a response that never reveals whether the account exists.
//! - **Diagnostics** ([`diagnostics`]): `check-env`, `db` and `smtp-test` subcommands for operators.
//!
//! ## Availability
//!
//! The database is optional at startup. Without a reachable database, reads answer "absent" or
//! "empty" and writes fail with a generic 500. See [`db`] for details.
//!
//! ## Startup
//!
//! ```no_run
//! use bizctl::{Application, Config};
//!
//! # async fn run(config: Config) -> anyhow::Result<()> {
//! let app = Application::new(config).await?;
//! app.serve(std::future::pending()).await
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod email;
pub mod errors;
pub mod openapi;
pub mod rpc;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{self, HeaderValue},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::{
    auth::oauth::OAuthRouter,
    config::CorsOrigin,
    db::{Database, store::DeploymentStore},
    email::EmailService,
    errors::Error,
    openapi::ApiDoc,
};

/// Install the process-wide rustls provider used by the provider HTTP client. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// State shared by every handler.
///
/// `deployments` and `oauth` both hold clones of `db`; all three hand out connections from the
/// same pool.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub deployments: DeploymentStore,
    pub email: Arc<EmailService>,
    pub oauth: Arc<OAuthRouter>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> anyhow::Result<Self> {
        install_crypto_provider();

        let config = Arc::new(config);
        let email = Arc::new(EmailService::new(&config)?);
        let oauth = Arc::new(OAuthRouter::new(config.clone(), db.clone())?);

        Ok(Self::builder()
            .deployments(DeploymentStore::new(db.clone()))
            .db(db)
            .email(email)
            .oauth(oauth)
            .config(config)
            .build())
    }
}

/// Get the bizctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration. A wildcard origin cannot be combined with credentials,
/// so credentials are dropped when one is configured.
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;
    let wildcard = cors_config.allowed_origins.contains(&CorsOrigin::Wildcard);

    let mut cors = if wildcard {
        if cors_config.allow_credentials {
            warn!("CORS wildcard origin configured; credentials will not be allowed");
        }
        CorsLayer::new().allow_origin(AllowOrigin::any())
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Url always serializes with a trailing slash; Origin headers never carry one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(cors_config.allow_credentials)
    };

    cors = cors
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers([http::header::CONTENT_TYPE])
        .expose_headers([http::header::LOCATION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

fn panic_response(_: Box<dyn std::any::Any + Send + 'static>) -> Response {
    Error::Internal {
        operation: "handle request: handler panicked".to_string(),
    }
    .into_response()
}

/// Build the application router: health check, auth, procedures and API docs, behind CORS,
/// request tracing and panic recovery.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api/auth/forgot-username", post(api::handlers::auth::forgot_username))
        .route("/api/auth/{*rest}", any(api::handlers::auth::auth_router))
        .route("/api/trpc/{procedure}", get(rpc::rpc_handler).post(rpc::rpc_handler))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone())
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    apply_layers(router, &state.config)
}

fn apply_layers(router: Router, config: &Config) -> anyhow::Result<Router> {
    let router = router
        .layer(create_cors_layer(config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CatchPanicLayer::custom(panic_response));

    Ok(router)
}

/// Run embedded migrations when configured. Failure is logged, not fatal: the service still
/// starts and the store reports itself unavailable.
async fn run_migrations(config: &Config, db: &Database) {
    if !config.database.run_migrations {
        debug!("Skipping migrations (disabled in config)");
        return;
    }
    let Some(pool) = db.pool() else {
        return;
    };
    match migrator().run(pool).await {
        Ok(()) => info!("Database migrations applied"),
        Err(e) => warn!("Failed to run database migrations: {}", e),
    }
}

/// The HTTP server and the resources it owns.
pub struct Application {
    router: Router,
    state: AppState,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(bind = %config.bind_address(), otel = config.enable_otel_export, "Starting bizctl");

        let db = Database::connect(&config.database)?;
        run_migrations(&config, &db).await;

        let state = AppState::new(config, db)?;
        let router = build_router(&state)?;

        Ok(Self { router, state })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.state.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("bizctl listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.state.db.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
