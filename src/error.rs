//! Request-level error taxonomy for the `/kobo/forms` pipeline.
//!
//! Every stage of the pipeline returns [`ApiError`]; the handler converts it
//! into an HTTP response through [`IntoResponse`]. Startup code keeps using
//! `anyhow` and never sees this type.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    /// Operator misconfiguration, e.g. missing Kobo credentials.
    #[error("Missing backend parameter: {0}")]
    Configuration(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Non-2xx status, transport failure or unexpected JSON from Kobo.
    #[error("Kobo request failed: {0}")]
    Upstream(String),

    /// A submission could not be normalized. Fails the whole batch.
    #[error("Invalid form response: {0}")]
    Data(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            ApiError::Configuration(_) | ApiError::Data(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn missing_param(name: &str) -> Self {
        ApiError::BadRequest(format!("Missing query parameter: {name}"))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest includes the URL in its message; strip it so query strings
        // with tokens never end up in a response body.
        ApiError::Upstream(err.without_url().to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed with {}: {}", status, self);
        } else {
            tracing::warn!("Request rejected with {}: {}", status, self);
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
