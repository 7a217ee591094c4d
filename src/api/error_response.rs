//! HTTP error response handling for the API
//!
//! Converts domain errors to HTTP responses with the flat
//! `{"error": "<message>"}` JSON body the API promises and the status
//! code from [`ToHttpStatus`].

use crate::error::{Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
