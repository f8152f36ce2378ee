//! Camera devices, sessions and still capture.
//!
//! This module owns every interaction with camera hardware: listing
//! devices, holding the single live stream, and turning its current
//! frame into a JPEG still.

mod backend;
mod config;
mod device;
mod frame;
mod mock;
#[cfg(feature = "camera")]
mod native;
mod session;

pub use backend::{BackendError, CameraBackend, VideoStream};
pub use config::{CameraConfig, Facing, StreamConstraints, DEFAULT_JPEG_QUALITY};
pub use device::{pick_default, Device, DeviceError, DeviceRegistry};
pub use frame::{encode_jpeg, CaptureError, CapturedFrame, FrameCapture, FRAME_MIME_TYPE};
pub use mock::{Gate, MockBackend};
#[cfg(feature = "camera")]
pub use native::NokhwaBackend;
pub use session::{CameraSession, SessionError, SessionStatus, StreamPreview};
