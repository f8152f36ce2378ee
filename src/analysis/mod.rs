//! Remote nutrition analysis.
//!
//! This module holds the request/response contract shared by the
//! client and the endpoint: payload signature checks, the fixed model
//! prompt, and the validated result type.

mod client;
mod prompt;
mod result;
mod signature;

pub use client::{AnalysisError, Analyzer, HttpAnalysisClient, MockAnalyzer};
pub use prompt::NUTRITION_PROMPT;
pub use result::{AnalysisResult, SchemaViolation};
pub(crate) use result::PartialResult;
pub use signature::ImageSignature;
