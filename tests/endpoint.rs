//! The analysis client talking to a live endpoint with a canned model.

#![cfg(feature = "server")]

use async_trait::async_trait;
use food_scanner::analysis::{
    AnalysisError, AnalysisResult, Analyzer, HttpAnalysisClient, ImageSignature,
};
use food_scanner::capture::{encode_jpeg, CapturedFrame};
use food_scanner::metrics::MetricsRegistry;
use food_scanner::server::{router, AppState, InferenceError, InferenceModel};
use image::{Rgb, RgbImage};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CannedModel {
    result: Option<AnalysisResult>,
    calls: AtomicUsize,
}

#[async_trait]
impl InferenceModel for CannedModel {
    async fn infer(
        &self,
        _image_base64: &str,
        _signature: ImageSignature,
    ) -> Result<AnalysisResult, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().ok_or(InferenceError::EmptyResponse)
    }
}

fn apple() -> AnalysisResult {
    AnalysisResult {
        food_name: "apple".into(),
        confidence: 0.92,
        calories: 52.0,
        protein: 0.3,
        carbs: 14.0,
        fats: 0.2,
    }
}

async fn spawn_endpoint(model: Arc<CannedModel>, development: bool) -> SocketAddr {
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let app = router(AppState::new(model, metrics, development), false);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn http() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn client(addr: SocketAddr) -> HttpAnalysisClient {
    HttpAnalysisClient::with_http(http(), format!("http://{}/api/analyze-food", addr))
}

fn jpeg_frame() -> CapturedFrame {
    let image = RgbImage::from_pixel(32, 24, Rgb([200, 40, 40]));
    CapturedFrame::new(encode_jpeg(&image, 80).unwrap(), 32, 24, 1)
}

#[tokio::test]
async fn test_client_receives_nutrition() {
    let model = Arc::new(CannedModel {
        result: Some(apple()),
        calls: AtomicUsize::new(0),
    });
    let addr = spawn_endpoint(Arc::clone(&model), false).await;

    let result = client(addr).analyze(jpeg_frame()).await.unwrap();
    assert_eq!(result, apple());
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_model_failure_becomes_service_error() {
    let model = Arc::new(CannedModel {
        result: None,
        calls: AtomicUsize::new(0),
    });
    let addr = spawn_endpoint(model, false).await;

    match client(addr).analyze(jpeg_frame()).await {
        Err(AnalysisError::ServiceError { status, message }) => {
            assert_eq!(status, Some(500));
            assert!(message.contains("no text"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_endpoint_rejects_bad_payloads() {
    let model = Arc::new(CannedModel {
        result: Some(apple()),
        calls: AtomicUsize::new(0),
    });
    let addr = spawn_endpoint(Arc::clone(&model), false).await;
    let url = format!("http://{}/api/analyze-food", addr);

    let bodies = [
        serde_json::json!({ "imageBase64": "R0lGODlhAQABAAAAACw=" }),
        serde_json::json!({ "imageBase64": "data:image/jpeg;base64,/9j/4AAQ" }),
        serde_json::json!({}),
    ];
    for body in bodies {
        let response = http().post(&url).json(&body).send().await.unwrap();
        assert_eq!(response.status(), 400);
        let reply: serde_json::Value = response.json().await.unwrap();
        assert_eq!(reply["success"], false);
        assert_eq!(
            reply["error"],
            "Invalid image data (must be JPEG/PNG base64 without prefix)"
        );
    }

    let malformed = http()
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_development_failure_includes_stack() {
    let model = Arc::new(CannedModel {
        result: None,
        calls: AtomicUsize::new(0),
    });
    let url = format!(
        "http://{}/api/analyze-food",
        spawn_endpoint(model, true).await
    );

    let response = http()
        .post(&url)
        .json(&serde_json::json!({ "imageBase64": jpeg_frame().to_base64() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let reply: serde_json::Value = response.json().await.unwrap();
    assert_eq!(reply["success"], false);
    assert!(reply["stack"].is_string());
}

#[tokio::test]
async fn test_health_and_metrics() {
    let model = Arc::new(CannedModel {
        result: Some(apple()),
        calls: AtomicUsize::new(0),
    });
    let addr = spawn_endpoint(model, false).await;
    client(addr).analyze(jpeg_frame()).await.unwrap();

    let health = http()
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "OK");

    let metrics = http()
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("food_scanner_analyze_requests_total 1"));
    assert!(metrics.contains("food_scanner_analyze_success_total 1"));
}
