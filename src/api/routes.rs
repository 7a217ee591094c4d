//! Job API route handlers
//!
//! All reads are point-in-time snapshots of the job store; no request
//! ever waits on a job's completion. Submission is fire-and-forget: it
//! creates the store entry, spawns the runner task, and returns the job
//! id immediately.

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{Job, JobId};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

/// Request body for job submission
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// The media URL to download
    pub url: Option<String>,
}

/// POST /download - Submit a download job
#[utoipa::path(
    post,
    path = "/download",
    tag = "jobs",
    request_body = SubmitRequest,
    responses(
        (status = 202, description = "Job accepted, returns {job_id}"),
        (status = 400, description = "Missing url")
    )
)]
pub async fn submit_download(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Response> {
    let url = payload
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(Error::MissingUrl)?;

    let id = JobId::new();
    state.store.create(id, url);
    state.runner.spawn(id, url.to_string());
    tracing::info!(job_id = %id, url, "accepted download job");

    Ok((StatusCode::ACCEPTED, Json(json!({ "job_id": id }))).into_response())
}

/// GET /status/:job_id - Full job snapshot
#[utoipa::path(
    get,
    path = "/status/{job_id}",
    tag = "jobs",
    params(("job_id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Job snapshot", body = Job),
        (status = 404, description = "Unknown job id")
    )
)]
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response> {
    let id = parse_job_id(&job_id)?;
    let job = state.store.snapshot(id).ok_or(Error::NotFound)?;
    Ok((StatusCode::OK, Json(job)).into_response())
}

/// GET /file/:job_id - Stream the first output file
#[utoipa::path(
    get,
    path = "/file/{job_id}",
    tag = "jobs",
    params(("job_id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Binary stream of the first output file"),
        (status = 404, description = "Unknown job, no file yet, or file missing from storage")
    )
)]
pub async fn job_file(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response> {
    let id = parse_job_id(&job_id)?;
    let job = state.store.snapshot(id).ok_or(Error::NotFound)?;
    let filename = job.files.first().cloned().ok_or(Error::NoFileForJob)?;

    let path = state.config.download_dir.join(&filename);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| Error::FileMissing)?;
    tracing::info!(job_id = %id, file = %filename, "serving result file");

    let stream = ReaderStream::new(file);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| Error::ApiServer(e.to_string()))
}

/// GET /log/:job_id - Structured log, falling back to the durable artifact
#[utoipa::path(
    get,
    path = "/log/{job_id}",
    tag = "jobs",
    params(("job_id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "{job_id, log: [...]} or {job_id, log_text}"),
        (status = 404, description = "Unknown job or no log available"),
        (status = 500, description = "Log artifact exists but cannot be read")
    )
)]
pub async fn job_log(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response> {
    let id = parse_job_id(&job_id)?;
    let job = state.store.snapshot(id).ok_or(Error::NotFound)?;

    if !job.log.is_empty() {
        let body = json!({ "job_id": id, "log": job.log });
        return Ok((StatusCode::OK, Json(body)).into_response());
    }

    // The in-memory log is empty; try the durable artifact.
    let path = state.store.log_path(id);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            let body = json!({ "job_id": id, "log_text": content });
            Ok((StatusCode::OK, Json(body)).into_response())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NoLogAvailable),
        Err(e) => Err(Error::LogReadFailed(e)),
    }
}

/// GET /health - Liveness check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Server is up"))
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /openapi.json - OpenAPI specification
pub async fn openapi_spec() -> impl IntoResponse {
    use utoipa::OpenApi;
    Json(crate::api::ApiDoc::openapi())
}

/// Unknown-looking ids (including unparseable ones) read as "not found"
fn parse_job_id(raw: &str) -> Result<JobId> {
    raw.parse().map_err(|_| Error::NotFound)
}
