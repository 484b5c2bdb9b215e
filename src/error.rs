use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Failure talking to the upstream timetable feed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream answered with status {0}")]
    Status(u16),

    #[error("feed is not a JSON array of events: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure reading or writing cached snapshots
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid building code {0:?}")]
    InvalidBuilding(String),
}

/// Errors surfaced by the refresh path
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors returned to HTTP clients as `{ "error": message }`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("No data for {0}")]
    NoData(String),

    #[error("No structure for {0}")]
    NoStructure(String),

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NoData(_) | ApiError::NoStructure(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Refresh(RefreshError::Cache(CacheError::InvalidBuilding(_))) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Refresh(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}
