//! HTTP endpoint that analyzes food photos.
//!
//! `POST /api/analyze-food` takes `{ "imageBase64": "..." }`, checks the
//! payload signature, forwards the image to an [`InferenceModel`] with a
//! fixed prompt, and answers with the nutrition object. `/metrics` and
//! `/health` are served alongside.

mod inference;
mod routes;

pub use inference::{parse_model_output, GeminiModel, InferenceError, InferenceModel};
pub use routes::{router, AppState};

use crate::config::ServerConfig;
use crate::metrics::MetricsRegistry;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// The analysis endpoint server.
pub struct AnalysisServer {
    config: ServerConfig,
    state: AppState,
}

impl AnalysisServer {
    /// Creates a server around an inference model.
    pub fn new(
        config: ServerConfig,
        model: Arc<dyn InferenceModel>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let state = AppState::new(model, metrics, config.development);
        Self { config, state }
    }

    /// Serves until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), ServerError> {
        let app = router(self.state, self.config.cors);
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(
            addr = %self.config.bind_addr,
            model = %self.config.model,
            development = self.config.development,
            "Analysis server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        tracing::info!("Analysis server stopped");
        Ok(())
    }
}
