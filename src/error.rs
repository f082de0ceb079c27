//! Error taxonomy for the scraping core and the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures produced by the scraping core.
///
/// `UnknownSite` is raised while validating a request, before any browser
/// resource is acquired. Everything else is recovered at the session or
/// orchestrator boundary and never aborts an overall scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unknown site: {0}")]
    UnknownSite(String),

    #[error("navigation failed: {0}")]
    Navigation(#[from] anyhow::Error),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("session cancelled by deadline")]
    Cancelled,

    #[error("upstream match service error: {0}")]
    Upstream(String),
}

/// HTTP-level error type. Handlers return `Result<T, ApiError>` and axum
/// renders the same `{error: true, message}` envelope for every failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::UnknownSite(site) => ApiError::Validation(format!(
                "Invalid site parameter: {}. Valid options: seek, indeed, linkedin",
                site
            )),
            other => ApiError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (status, Json(json!({ "error": true, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_site_maps_to_validation() {
        let api: ApiError = ScrapeError::UnknownSite("monster_board_typo".into()).into();
        let resp = api.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_map_to_500() {
        let api = ApiError::Internal(anyhow::anyhow!("boom"));
        let resp = api.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
