//! Still-frame capture and JPEG encoding.

use super::{CameraSession, SessionError, DEFAULT_JPEG_QUALITY};
use crate::error::ErrorKind;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::cell::Cell;
use thiserror::Error;

/// MIME type of every captured frame.
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// Errors that can occur while capturing a frame.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera session is not active")]
    SessionNotActive,
    #[error("failed to read frame: {0}")]
    Camera(String),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::SessionNotActive => ErrorKind::SessionNotActive,
            CaptureError::Camera(_) => ErrorKind::CameraUnavailable,
            CaptureError::Encode(_) => ErrorKind::InvalidImage,
        }
    }
}

impl From<SessionError> for CaptureError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SessionNotActive | SessionError::Superseded => {
                CaptureError::SessionNotActive
            }
            SessionError::CameraUnavailable(reason) => CaptureError::Camera(reason),
        }
    }
}

/// A single encoded still.
///
/// Consumed by one analysis request.
pub struct CapturedFrame {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    captured_at: DateTime<Utc>,
    sequence: u64,
}

impl CapturedFrame {
    /// Wraps an already encoded JPEG buffer.
    pub fn new(bytes: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            bytes,
            width,
            height,
            captured_at: Utc::now(),
            sequence,
        }
    }

    /// Encoded image bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn mime_type(&self) -> &'static str {
        FRAME_MIME_TYPE
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Monotonic capture counter.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Raw base64 payload, without a data-URI prefix.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

impl std::fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("encoded_bytes", &self.bytes.len())
            .finish()
    }
}

/// Encodes an RGB image as JPEG at `quality` (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buffer)
}

/// Grabs stills from an active session.
#[derive(Debug)]
pub struct FrameCapture {
    quality: u8,
    sequence: Cell<u64>,
}

impl Default for FrameCapture {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameCapture {
    pub fn new(quality: u8) -> Self {
        Self {
            quality,
            sequence: Cell::new(0),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Reads the current frame and encodes it.
    ///
    /// Does not change the session's status.
    pub async fn capture(&self, session: &CameraSession) -> Result<CapturedFrame, CaptureError> {
        if !session.is_active() {
            return Err(CaptureError::SessionNotActive);
        }

        let image = session.read_frame().await?;
        let (width, height) = image.dimensions();
        let bytes = encode_jpeg(&image, self.quality)?;

        let sequence = self.sequence.get() + 1;
        self.sequence.set(sequence);
        tracing::debug!(width, height, bytes = bytes.len(), sequence, "Frame captured");

        Ok(CapturedFrame::new(bytes, width, height, sequence))
    }
}
