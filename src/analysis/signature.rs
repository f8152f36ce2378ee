//! Image signature checks on base64 payloads.
//!
//! Both the client and the endpoint reject payloads that do not open
//! with a JPEG or PNG signature.

use serde::Serialize;

/// Base64 of the JPEG SOI marker plus the first marker byte.
const JPEG_PREFIX: &str = "/9j/";
/// Base64 of the 8-byte PNG signature.
const PNG_PREFIX: &str = "iVBORw0KGgo";

/// Recognised image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageSignature {
    Jpeg,
    Png,
}

impl ImageSignature {
    /// Detects the format of a raw base64 payload.
    pub fn detect(payload: &str) -> Option<Self> {
        if payload.starts_with(JPEG_PREFIX) {
            Some(ImageSignature::Jpeg)
        } else if payload.starts_with(PNG_PREFIX) {
            Some(ImageSignature::Png)
        } else {
            None
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageSignature::Jpeg => "image/jpeg",
            ImageSignature::Png => "image/png",
        }
    }
}
