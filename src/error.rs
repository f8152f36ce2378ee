//! Failure taxonomy shared by every component.
//!
//! Each module keeps its own `thiserror` enum. This module names the
//! coarse category the UI cares about, so that an error message can be
//! paired with the command that retries it.

use serde::Serialize;
use std::fmt;

/// Category of a failure, independent of which component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The platform refused camera access.
    PermissionDenied,
    /// The platform reports no usable video input.
    NoDeviceFound,
    /// A camera stream could not be opened or read.
    CameraUnavailable,
    /// A frame was requested without an active session.
    SessionNotActive,
    /// The image payload failed local validation.
    InvalidImage,
    /// The analysis service answered with an error or malformed body.
    ServiceError,
    /// The analysis request never got an answer.
    NetworkFailure,
}

/// The user command that retries a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryAction {
    ListDevices,
    StartCamera,
    Capture,
}

impl ErrorKind {
    /// Returns the command a user presses to try again.
    pub fn retry_action(self) -> RetryAction {
        match self {
            ErrorKind::PermissionDenied | ErrorKind::NoDeviceFound => RetryAction::ListDevices,
            ErrorKind::CameraUnavailable => RetryAction::StartCamera,
            ErrorKind::SessionNotActive
            | ErrorKind::InvalidImage
            | ErrorKind::ServiceError
            | ErrorKind::NetworkFailure => RetryAction::Capture,
        }
    }

    /// Nothing in the scan flow is fatal to the process.
    pub fn is_recoverable(self) -> bool {
        true
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::NoDeviceFound => "no device found",
            ErrorKind::CameraUnavailable => "camera unavailable",
            ErrorKind::SessionNotActive => "session not active",
            ErrorKind::InvalidImage => "invalid image",
            ErrorKind::ServiceError => "service error",
            ErrorKind::NetworkFailure => "network failure",
        };
        f.write_str(name)
    }
}
