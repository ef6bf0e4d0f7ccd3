use crate::media::{DownloadRequest, MediaError, MediaGateway, ResolutionResult};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

type AppState = Arc<MediaGateway>;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub url: Option<String>,
    pub index: Option<String>,
    pub format_id: Option<String>,
}

pub fn router(gateway: AppState) -> Router {
    Router::new()
        .route("/api/media", post(analyze))
        .route("/api/download", get(download))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(gateway)
}

/// Request-boundary wrapper: every failure becomes `{ "error": ... }`.
pub struct ApiError(MediaError);

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &MediaError) -> StatusCode {
    match err {
        MediaError::InvalidInput(_) | MediaError::UnsupportedPlatform(_) => StatusCode::BAD_REQUEST,
        MediaError::AuthRequired => StatusCode::FORBIDDEN,
        MediaError::NotFound | MediaError::ItemNotFound { .. } | MediaError::FormatNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        MediaError::NoDownloadableMedia => StatusCode::UNPROCESSABLE_ENTITY,
        MediaError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        MediaError::UnknownExtractionFailure(_) | MediaError::StreamFailure(_) => {
            StatusCode::BAD_GATEWAY
        }
        MediaError::MergeUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        match self.0.diagnostic() {
            Some(detail) => error!("Request failed ({}): {} - {}", status, self.0, detail),
            None => info!("Request failed ({}): {:?}", status, self.0),
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn analyze(
    State(gateway): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ResolutionResult>, ApiError> {
    let Json(request) = payload.map_err(|_| {
        MediaError::InvalidInput("Send a JSON body with a \"url\" field.".to_string())
    })?;

    Ok(Json(gateway.analyze(&request.url).await?))
}

fn parse_index(raw: Option<&str>) -> Result<Option<usize>, MediaError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
            MediaError::InvalidInput("Index must be a whole number starting at 1.".to_string())
        }),
    }
}

async fn download(
    State(gateway): State<AppState>,
    params: Result<Query<DownloadParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params
        .map_err(|_| MediaError::InvalidInput("Malformed download query.".to_string()))?;

    let request = DownloadRequest {
        url: params.url.unwrap_or_default(),
        index: parse_index(params.index.as_deref())?,
        format_id: params.format_id,
    };
    let download = gateway.download(request).await?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download.filename),
        );
    if let Some(length) = download.content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    response
        .body(Body::from_stream(download.body))
        .map_err(|e| MediaError::StreamFailure(format!("Failed to build response: {}", e)).into())
}
