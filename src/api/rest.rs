//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{Method, StatusCode},
    response::Json,
    routing::{any, get},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::service::{DetectionService, ServiceError};

use super::dto::*;

/// Primary detection route
pub const DETECTION_ROUTE: &str = "/v1/vision/detection";

/// Legacy alias of [`DETECTION_ROUTE`]
pub const PREDICT_ROUTE: &str = "/predict";

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<DetectionService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<DetectionService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

/// Create the REST API router
pub fn create_rest_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(info_handler))
        .route(DETECTION_ROUTE, any(detect_handler))
        .route(PREDICT_ROUTE, any(detect_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Uploaded `image` form field
struct ImageUpload {
    file_name: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Find the first `image` file part in a multipart body
///
/// Only parts carrying a `filename` count as uploads; a plain text field
/// named `image` is skipped. An empty upload yields `None`.
async fn read_image_field(mut multipart: Multipart) -> Result<Option<ImageUpload>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            debug!("Skipping non-file image field");
            continue;
        };

        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;

        if data.is_empty() {
            return Ok(None);
        }

        return Ok(Some(ImageUpload {
            file_name,
            content_type,
            data: data.to_vec(),
        }));
    }

    Ok(None)
}

/// Model info
async fn info_handler(State(state): State<Arc<AppState>>) -> String {
    format!(
        "Object detection service exposing model: {}\n",
        state.service.model_path().display()
    )
}

/// Detect objects in an uploaded image
///
/// Anything short of a POST carrying an `image` field answers
/// `{"success": false}` with status 200.
async fn detect_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, (StatusCode, Json<ErrorResponse>)> {
    if method != Method::POST {
        debug!("Ignoring {} request to detection route", method);
        return Ok(Json(PredictionResponse::failure()));
    }

    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(e) => {
            debug!("Request has no multipart body: {}", e);
            return Ok(Json(PredictionResponse::failure()));
        }
    };

    let upload = match read_image_field(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            debug!("Request has no image field");
            return Ok(Json(PredictionResponse::failure()));
        }
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!("Rejected upload: {}", e);
            return Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ErrorResponse::new(&e.body_text(), "PAYLOAD_TOO_LARGE")),
            ));
        }
        Err(e) => {
            warn!("Failed to read multipart body: {}", e);
            return Ok(Json(PredictionResponse::failure()));
        }
    };

    let request_id = Uuid::new_v4();
    info!(
        "[{}] Received image {:?} ({}, {} bytes)",
        request_id,
        upload.file_name,
        upload.content_type.as_deref().unwrap_or("unknown type"),
        upload.data.len()
    );

    let response = state.service.predict(upload.data).await.map_err(|e| {
        error!("[{}] Detection failed: {}", request_id, e);
        (error_status(&e), Json(ErrorResponse::from(&e)))
    })?;

    Ok(Json(response))
}

/// HTTP status reported for a failed detection
fn error_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Health check
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health();

    Json(HealthResponse {
        healthy: health.healthy,
        version: health.version,
        model: health.model,
        labels: health.labels,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&ServiceError::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            error_status(&ServiceError::UnknownLabel(3)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
