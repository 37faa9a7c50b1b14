//! # leasecheck: lease contract risk review
//!
//! `leasecheck` is a small web service for prospective tenants. A user uploads a residential
//! lease contract (a PDF or a photo/scan of one), the service forwards the document to a
//! generative model together with a fixed review instruction, and the model's verdict comes back
//! as a structured assessment: a summary, a three-level safety rating, risk factors and
//! recommendations. A browser client for the upload is embedded in the binary.
//!
//! ## Request Flow
//!
//! `POST /api/analyze` carries a multipart form with a single `contract` file field. The
//! [`upload`] module checks the declared media type before reading anything, enforces the size
//! limit while the file streams in, and writes the accepted bytes to a transient directory. The
//! [`analysis`] module base64-encodes the stored file, sends it to the configured
//! [`GenerativeModel`](analysis::gemini::GenerativeModel) in a single call, and turns the free-form
//! reply into an [`AnalysisResult`](api::models::analysis::AnalysisResult). Replies that are not
//! usable JSON degrade to a cautious fallback assessment instead of an error. The transient file
//! is removed before the response is sent, whatever the outcome.
//!
//! `GET /api/health` reports liveness and whether a model API key is configured.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use leasecheck::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = leasecheck::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     leasecheck::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod analysis;
pub mod api;
pub mod config;
pub mod errors;
mod openapi;
mod static_assets;
pub mod telemetry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::analysis::Analyzer;
use crate::analysis::gemini::{GeminiModel, GenerativeModel};
use crate::config::CorsOrigin;
use crate::openapi::ApiDoc;
use crate::upload::UploadStore;

pub use config::Config;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .analyzer(Analyzer::new(model))
///     .uploads(UploadStore::new(&config.uploads))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub analyzer: Analyzer,
    pub uploads: UploadStore,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// Mounts the analysis and health endpoints under `/api`, the API docs, a bare `/healthz`
/// liveness probe and the embedded browser client. CORS is only applied when origins are
/// configured (the embedded client is same-origin). Prometheus metrics are exposed at
/// `/internal/metrics` when enabled.
///
/// # Errors
///
/// Returns an error if the CORS configuration cannot be turned into header values.
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route(
            "/analyze",
            post(api::handlers::analyze::analyze_contract).layer(DefaultBodyLimit::max(state.config.uploads.body_limit())),
        )
        .route("/health", get(api::handlers::health::health))
        .route("/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .fallback_service(get(api::handlers::static_assets::serve_embedded_asset));

    if !state.config.cors.allowed_origins.is_empty() {
        router = router.layer(create_cors_layer(&state.config)?);
    }

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
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

/// The assembled service: router plus the configuration it was built from.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create the application with the Gemini client described by `config`.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let model = GeminiModel::new(&config.gemini)?;
        Self::with_model(config, Arc::new(model)).await
    }

    /// Create the application around any [`GenerativeModel`].
    pub async fn with_model(config: Config, model: Arc<dyn GenerativeModel>) -> anyhow::Result<Self> {
        debug!("Starting leasecheck with configuration: {:#?}", config);

        let uploads = UploadStore::new(&config.uploads);
        uploads.ensure_dir().await?;

        let state = AppState::builder()
            .config(config.clone())
            .analyzer(Analyzer::new(model))
            .uploads(uploads)
            .build();

        let router = build_router(&state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
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
            "leasecheck listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );
        if !self.config.gemini_configured() {
            warn!("No Gemini API key configured: /api/analyze will fail until GEMINI_API_KEY is set");
        }

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
