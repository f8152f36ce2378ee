//! Platform seam for camera access.
//!
//! The scan flow runs on a single event thread, so these traits do not
//! require `Send` futures. Implementations that talk to blocking
//! hardware move that work off the event thread themselves.

use super::{Device, StreamConstraints};
use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

/// Errors reported by a camera platform.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no matching camera device: {0}")]
    NotFound(String),
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("camera stream closed")]
    Closed,
}

/// Access to the host's video inputs.
#[async_trait(?Send)]
pub trait CameraBackend {
    /// Lists video-input devices in platform order.
    ///
    /// Labels may be empty until camera permission has been granted.
    async fn video_inputs(&self) -> Result<Vec<Device>, BackendError>;

    /// Opens a live stream matching the constraints.
    async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, BackendError>;
}

/// One open camera stream.
#[async_trait(?Send)]
pub trait VideoStream {
    /// Device the stream was opened on.
    fn device_id(&self) -> &str;

    /// Reads the current frame at native resolution.
    async fn grab(&self) -> Result<RgbImage, BackendError>;

    /// Stops all tracks. Calling it more than once has no effect.
    fn release(&self);

    /// Returns false once released.
    fn is_live(&self) -> bool;
}
