//! HTTP routes of the analysis endpoint.

use super::InferenceModel;
use crate::analysis::{AnalysisResult, ImageSignature};
use crate::metrics::MetricsRegistry;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

const INVALID_IMAGE_MESSAGE: &str = "Invalid image data (must be JPEG/PNG base64 without prefix)";

/// Shared state for the endpoint handlers.
#[derive(Clone)]
pub struct AppState {
    model: Arc<dyn InferenceModel>,
    metrics: Arc<MetricsRegistry>,
    development: bool,
}

impl AppState {
    pub fn new(
        model: Arc<dyn InferenceModel>,
        metrics: Arc<MetricsRegistry>,
        development: bool,
    ) -> Self {
        Self {
            model,
            metrics,
            development,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeFoodRequest {
    image_base64: Option<String>,
}

#[derive(Serialize)]
struct SuccessBody {
    success: bool,
    #[serde(flatten)]
    result: AnalysisResult,
}

#[derive(Serialize)]
struct FailureBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

fn failure(status: StatusCode, error: impl Into<String>, stack: Option<String>) -> Response {
    (
        status,
        Json(FailureBody {
            success: false,
            error: error.into(),
            stack,
        }),
    )
        .into_response()
}

/// Renders an error and its sources, one per line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str("\ncaused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// Builds the endpoint router.
pub fn router(state: AppState, cors: bool) -> Router {
    let router = Router::new()
        .route("/api/analyze-food", post(analyze_food))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Handler for `POST /api/analyze-food`.
async fn analyze_food(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeFoodRequest>, JsonRejection>,
) -> Response {
    state.metrics.record_request();

    let image = match payload {
        Ok(Json(request)) => request.image_base64,
        Err(rejection) => {
            state.metrics.record_invalid();
            tracing::info!(error = %rejection, "Rejected malformed analysis request");
            return failure(StatusCode::BAD_REQUEST, rejection.body_text(), None);
        }
    };

    let Some((image, signature)) = image.and_then(|image| {
        let signature = ImageSignature::detect(&image)?;
        Some((image, signature))
    }) else {
        state.metrics.record_invalid();
        tracing::info!("Rejected analysis request without JPEG/PNG data");
        return failure(StatusCode::BAD_REQUEST, INVALID_IMAGE_MESSAGE, None);
    };

    let started = Instant::now();
    match state.model.infer(&image, signature).await {
        Ok(result) => {
            state.metrics.record_success(started.elapsed());
            tracing::info!(
                food = %result.food_name,
                confidence = result.confidence,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Analysis succeeded"
            );
            (
                StatusCode::OK,
                Json(SuccessBody {
                    success: true,
                    result,
                }),
            )
                .into_response()
        }
        Err(err) => {
            state.metrics.record_failure(started.elapsed());
            tracing::error!(error = %err, "Analysis failed");
            let stack = state.development.then(|| error_chain(&err));
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), stack)
        }
    }
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_lists_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "reset by peer");
        let err = crate::server::ServerError::Bind(io);
        let chain = error_chain(&err);
        assert!(chain.starts_with("failed to bind to address"));
        assert!(chain.contains("caused by: reset by peer"));
    }

    #[test]
    fn test_success_body_is_flat() {
        let body = SuccessBody {
            success: true,
            result: AnalysisResult {
                food_name: "apple".into(),
                confidence: 0.9,
                calories: 52.0,
                protein: 0.3,
                carbs: 14.0,
                fats: 0.2,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["foodName"], "apple");
        assert!(json.get("result").is_none());
    }
}
