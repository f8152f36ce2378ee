//! Multimodal inference behind the analysis endpoint.

use crate::analysis::{AnalysisResult, ImageSignature, PartialResult, SchemaViolation, NUTRITION_PROMPT};
use crate::config::ServerConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while calling the inference service.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("inference response contained no text")]
    EmptyResponse,
    #[error("model output is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model output does not match the nutrition schema: {0}")]
    Schema(#[from] SchemaViolation),
}

/// A model that reads nutrition facts off a food photo.
#[async_trait]
pub trait InferenceModel: Send + Sync {
    /// Analyzes one base64 image whose format has already been checked.
    async fn infer(
        &self,
        image_base64: &str,
        signature: ImageSignature,
    ) -> Result<AnalysisResult, InferenceError>;
}

/// Parses model text as a nutrition object.
pub fn parse_model_output(text: &str) -> Result<AnalysisResult, InferenceError> {
    let partial: PartialResult = serde_json::from_str(text.trim())?;
    Ok(partial.complete()?)
}

/// Gemini `generateContent` over REST.
pub struct GeminiModel {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    pub fn new(config: &ServerConfig, api_key: String) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(config.inference_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.inference_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
    }
}

#[async_trait]
impl InferenceModel for GeminiModel {
    async fn infer(
        &self,
        image_base64: &str,
        signature: ImageSignature,
    ) -> Result<AnalysisResult, InferenceError> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text {
                        text: NUTRITION_PROMPT,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: signature.mime_type(),
                            data: image_base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response.json().await?;
        let text = reply.text().ok_or(InferenceError::EmptyResponse)?;
        tracing::debug!(model = %self.model, chars = text.len(), "Model responded");
        parse_model_output(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_output() {
        let result = parse_model_output(
            r#" {"foodName":"banana","confidence":0.8,"calories":89,"protein":1.1,"carbs":23,"fats":0.3} "#,
        )
        .unwrap();
        assert_eq!(result.food_name, "banana");
    }

    #[test]
    fn test_parse_model_output_rejects_prose() {
        assert!(matches!(
            parse_model_output("This looks like a banana."),
            Err(InferenceError::Parse(_))
        ));
        assert!(matches!(
            parse_model_output(r#"{"foodName":"banana"}"#),
            Err(InferenceError::Schema(SchemaViolation::MissingField("confidence")))
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text { text: "prompt" },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: "iVBORw0KGgo",
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_response_text_extraction() {
        let reply: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":1}"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(reply.text().as_deref(), Some(r#"{"a":1}"#));

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.text().is_none());
    }
}
