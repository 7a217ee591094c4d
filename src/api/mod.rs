//! REST API server module
//!
//! Exposes the job orchestration layer over HTTP: submit a download,
//! then poll status, log, and the resulting file by job id.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::runner::JobRunner;
use crate::store::JobStore;
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `POST /download` - Submit a URL, returns 202 with `{job_id}`
/// - `GET /status/:job_id` - Full job snapshot
/// - `GET /file/:job_id` - Binary stream of the first output file
/// - `GET /log/:job_id` - Structured log, or durable-artifact fallback
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
pub fn create_router(state: AppState) -> Router {
    let cors_enabled = state.config.api.cors_enabled;
    let cors_origins = state.config.api.cors_origins.clone();

    let router = Router::new()
        .route("/download", post(routes::submit_download))
        .route("/status/:job_id", get(routes::job_status))
        .route("/file/:job_id", get(routes::job_file))
        .route("/log/:job_id", get(routes::job_log))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router.layer(build_cors_layer(&cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Supports "*" for any origin; otherwise only the listed origins are
/// allowed, with all methods and headers.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Wires up the store and runner, binds a TCP listener, and serves until
/// shut down. Jobs spawned by requests run on the same runtime,
/// independently of any single connection.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, api};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// config.ensure_directories()?;
///
/// // Serves until the process is stopped
/// api::start_api_server(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let store = Arc::new(JobStore::new(&config.log_dir));
    let runner = Arc::new(JobRunner::new(store.clone(), config.clone()));
    let state = AppState::new(store, runner, config.clone());

    let bind_address = config.api.bind_address;
    tracing::info!(address = %bind_address, "starting API server");

    let app = create_router(state);
    let listener = TcpListener::bind(bind_address).await.map_err(Error::Io)?;
    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::ApiServer(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
