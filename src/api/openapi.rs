//! OpenAPI documentation for the job API

use utoipa::OpenApi;

/// OpenAPI specification for the media-dl job API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl API",
        description = "Asynchronous media download job server: submit a URL, \
                       poll status/log, fetch the resulting file.",
        license(name = "MIT OR Apache-2.0")
    ),
    paths(
        crate::api::routes::submit_download,
        crate::api::routes::job_status,
        crate::api::routes::job_file,
        crate::api::routes::job_log,
        crate::api::routes::health_check,
    ),
    components(schemas(
        crate::types::Job,
        crate::types::JobId,
        crate::types::JobStatus,
        crate::types::Progress,
        crate::api::routes::SubmitRequest,
    )),
    tags(
        (name = "jobs", description = "Download job submission and polling"),
        (name = "system", description = "Health and metadata")
    )
)]
pub struct ApiDoc;
