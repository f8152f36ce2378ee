//! Client side of the analysis endpoint.

use super::result::PartialResult;
use super::{AnalysisResult, ImageSignature};
use crate::capture::{CapturedFrame, Gate};
use crate::config::AnalysisConfig;
use crate::error::ErrorKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use thiserror::Error;

/// Errors that can occur during analysis.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Rejected locally; nothing was sent.
    #[error("invalid image data: {0}")]
    InvalidImage(String),
    /// The service answered, but not with a usable result.
    #[error("analysis service error: {message}")]
    ServiceError { status: Option<u16>, message: String },
    /// No answer arrived.
    #[error("network failure: {0}")]
    NetworkFailure(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidImage(_) => ErrorKind::InvalidImage,
            AnalysisError::ServiceError { .. } => ErrorKind::ServiceError,
            AnalysisError::NetworkFailure(_) => ErrorKind::NetworkFailure,
        }
    }

    fn service(status: Option<u16>, message: impl Into<String>) -> Self {
        AnalysisError::ServiceError {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::NetworkFailure(format!("request timed out: {}", err))
        } else {
            AnalysisError::NetworkFailure(err.to_string())
        }
    }
}

/// Turns a captured frame into nutrition facts.
///
/// Implementations issue one request per call and never retry.
#[async_trait(?Send)]
pub trait Analyzer {
    async fn analyze(&self, frame: CapturedFrame) -> Result<AnalysisResult, AnalysisError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    image_base64: &'a str,
}

#[derive(Deserialize)]
struct EndpointReply {
    #[serde(default)]
    success: bool,
    error: Option<String>,
    #[serde(flatten)]
    fields: PartialResult,
}

/// HTTP client for the `POST {imageBase64}` analysis endpoint.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAnalysisClient {
    /// Builds a client with the configured endpoint and request timeout.
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Uses a caller-built HTTP client.
    pub fn with_http(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Validates and submits a raw base64 payload.
    pub async fn analyze_base64(&self, payload: &str) -> Result<AnalysisResult, AnalysisError> {
        let signature = ImageSignature::detect(payload).ok_or_else(|| {
            AnalysisError::InvalidImage("payload is not base64 JPEG or PNG data".into())
        })?;
        tracing::debug!(?signature, bytes = payload.len(), endpoint = %self.endpoint, "Submitting image");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&AnalyzeRequest {
                image_base64: payload,
            })
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        decode_reply(status, &body)
    }
}

/// Interprets an endpoint reply.
fn decode_reply(status: u16, body: &str) -> Result<AnalysisResult, AnalysisError> {
    let success_status = (200..300).contains(&status);
    let reply: EndpointReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(e) if success_status => {
            return Err(AnalysisError::service(
                Some(status),
                format!("malformed response body: {}", e),
            ));
        }
        Err(_) => {
            return Err(AnalysisError::service(
                Some(status),
                format!("HTTP {}", status),
            ));
        }
    };

    if !success_status || !reply.success {
        let message = reply.error.unwrap_or_else(|| "Analysis failed".into());
        return Err(AnalysisError::service(Some(status), message));
    }

    reply
        .fields
        .complete()
        .map_err(|violation| AnalysisError::service(Some(status), violation.to_string()))
}

#[async_trait(?Send)]
impl Analyzer for HttpAnalysisClient {
    async fn analyze(&self, frame: CapturedFrame) -> Result<AnalysisResult, AnalysisError> {
        let payload = frame.to_base64();
        self.analyze_base64(&payload).await
    }
}

/// Scripted analyzer for tests and offline demos.
#[derive(Debug)]
pub struct MockAnalyzer {
    outcome: Result<AnalysisResult, AnalysisError>,
    gate: Gate,
    calls: Cell<usize>,
    completed: Cell<usize>,
}

impl MockAnalyzer {
    /// Always answers with `result`.
    pub fn returning(result: AnalysisResult) -> Self {
        Self::with_outcome(Ok(result))
    }

    /// Always fails with `error`.
    pub fn failing(error: AnalysisError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<AnalysisResult, AnalysisError>) -> Self {
        Self {
            outcome,
            gate: Gate::new(),
            calls: Cell::new(0),
            completed: Cell::new(0),
        }
    }

    /// Gate that holds responses while held.
    pub fn gate(&self) -> Gate {
        self.gate.clone()
    }

    /// Requests started.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Requests that produced an answer.
    pub fn completed(&self) -> usize {
        self.completed.get()
    }
}

#[async_trait(?Send)]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, frame: CapturedFrame) -> Result<AnalysisResult, AnalysisError> {
        self.calls.set(self.calls.get() + 1);
        if ImageSignature::detect(&frame.to_base64()).is_none() {
            return Err(AnalysisError::InvalidImage("frame is not JPEG or PNG".into()));
        }
        self.gate.pass().await;
        self.completed.set(self.completed.get() + 1);
        self.outcome.clone()
    }
}
