//! Configuration file and environment settings.
//!
//! Every section and field has a default, so an empty file (or no file)
//! is a valid configuration.

use crate::capture::CameraConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the inference service credential.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid JPEG quality {0} (must be 1-100)")]
    InvalidQuality(u8),
    #[error("invalid analysis endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("request timeout must be greater than zero")]
    InvalidTimeout,
    #[error("{0} is not set")]
    MissingCredential(&'static str),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Analysis client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Full URL of the analysis endpoint.
    pub endpoint: String,
    /// Upper bound on one analysis request, in seconds.
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/api/analyze-food".into(),
            timeout_secs: 30,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Analysis endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the endpoint to.
    pub bind_addr: SocketAddr,
    /// Inference model name.
    pub model: String,
    /// Base URL of the inference REST API.
    pub inference_url: String,
    /// Upper bound on one inference call, in seconds.
    pub inference_timeout_secs: u64,
    /// Include error chains in 500 responses.
    pub development: bool,
    /// Allow cross-origin requests.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 3000).into(),
            model: "gemini-2.5-flash".into(),
            inference_url: "https://generativelanguage.googleapis.com".into(),
            inference_timeout_secs: 60,
            development: false,
            cors: false,
        }
    }
}

impl ServerConfig {
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Reads the inference credential from the environment.
    pub fn api_key_from_env() -> Result<String, ConfigError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential(API_KEY_ENV)),
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        self.analysis.validate()?;
        self.server.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config.camera.jpeg_quality, 80);
        assert_eq!(config.analysis.timeout(), Duration::from_secs(30));
        assert_eq!(config.server.bind_addr.port(), 3000);
        assert!(!config.server.development);
    }

    #[test]
    fn test_partial_sections() {
        let config = FileConfig::from_toml(
            r#"
            [camera]
            facing = "user"
            jpeg_quality = 70

            [analysis]
            endpoint = "https://scan.example.com/api/analyze-food"
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.facing, crate::capture::Facing::User);
        assert_eq!(config.camera.ideal_width, 1280);
        assert_eq!(config.analysis.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            FileConfig::from_toml("[analysis]\ntimeout_secs = 0"),
            Err(ConfigError::InvalidTimeout)
        ));
        assert!(matches!(
            FileConfig::from_toml("[analysis]\nendpoint = \"ftp://x\""),
            Err(ConfigError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            FileConfig::from_toml("[camera]\njpeg_quality = 101"),
            Err(ConfigError::InvalidQuality(101))
        ));
        assert!(matches!(
            FileConfig::from_toml("camera = 3"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
