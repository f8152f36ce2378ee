//! Camera device enumeration and default selection.

use super::{BackendError, CameraBackend, StreamConstraints};
use crate::error::ErrorKind;
use serde::Serialize;
use std::rc::Rc;
use thiserror::Error;

/// A camera input exposed by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    id: String,
    label: String,
    rear_facing: bool,
}

impl Device {
    /// Creates a device, deriving the lens direction from its label.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: id.into(),
            rear_facing: is_rear_label(&label),
            label,
        }
    }

    /// Opaque platform identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable name; may be empty before permission is granted.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True when the label says "back" or "rear".
    #[inline]
    pub fn is_rear_facing(&self) -> bool {
        self.rear_facing
    }
}

fn is_rear_label(label: &str) -> bool {
    let label = label.to_lowercase();
    label.contains("back") || label.contains("rear")
}

/// Errors that can occur during device enumeration.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera found")]
    NoDeviceFound,
    #[error("device enumeration failed: {0}")]
    Backend(String),
}

impl DeviceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::PermissionDenied => ErrorKind::PermissionDenied,
            DeviceError::NoDeviceFound => ErrorKind::NoDeviceFound,
            DeviceError::Backend(_) => ErrorKind::CameraUnavailable,
        }
    }
}

impl From<BackendError> for DeviceError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::PermissionDenied => DeviceError::PermissionDenied,
            BackendError::NotFound(_) => DeviceError::NoDeviceFound,
            other => DeviceError::Backend(other.to_string()),
        }
    }
}

/// Lists the platform's cameras.
pub struct DeviceRegistry {
    backend: Rc<dyn CameraBackend>,
}

impl DeviceRegistry {
    pub fn new(backend: Rc<dyn CameraBackend>) -> Self {
        Self { backend }
    }

    /// Unlocks labels with a probe stream, then lists video inputs.
    ///
    /// The probe is released before listing. A platform with no video
    /// input yields an empty list rather than an error.
    pub async fn enumerate(&self) -> Result<Vec<Device>, DeviceError> {
        match self.backend.acquire(&StreamConstraints::probe()).await {
            Ok(probe) => probe.release(),
            Err(BackendError::NotFound(reason)) => {
                tracing::debug!(%reason, "No camera to probe");
            }
            Err(BackendError::PermissionDenied) => return Err(DeviceError::PermissionDenied),
            Err(err) => {
                // Labels stay redacted, the list itself is still useful
                tracing::warn!(error = %err, "Camera probe failed");
            }
        }
        self.list().await
    }

    /// Lists video inputs without probing.
    ///
    /// Used once a session has already been granted, when labels are
    /// readable and a second stream would contend for the hardware.
    pub async fn list(&self) -> Result<Vec<Device>, DeviceError> {
        let devices = self.backend.video_inputs().await?;
        tracing::debug!(count = devices.len(), "Enumerated video inputs");
        Ok(devices)
    }
}

/// Picks the camera to open by default.
///
/// Prefers the first rear-facing device, then the first device.
pub fn pick_default(devices: &[Device]) -> Option<&str> {
    devices
        .iter()
        .find(|d| d.is_rear_facing())
        .or_else(|| devices.first())
        .map(Device::id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockBackend;
    use proptest::prelude::*;

    #[test]
    fn test_pick_default_prefers_back() {
        let devices = vec![Device::new("a", "Front"), Device::new("b", "Back Camera")];
        assert_eq!(pick_default(&devices), Some("b"));
    }

    #[test]
    fn test_pick_default_falls_back_to_first() {
        let devices = vec![Device::new("a", "Front")];
        assert_eq!(pick_default(&devices), Some("a"));
        assert_eq!(pick_default(&[]), None);
    }

    #[test]
    fn test_rear_label_case_insensitive() {
        assert!(Device::new("x", "REAR wide").is_rear_facing());
        assert!(Device::new("x", "camera2 0, facing back").is_rear_facing());
        assert!(!Device::new("x", "FaceTime HD").is_rear_facing());
        assert!(!Device::new("x", "").is_rear_facing());
    }

    #[tokio::test]
    async fn test_enumerate_zero_inputs_is_empty() {
        let backend = Rc::new(MockBackend::with_devices(Vec::new()));
        let registry = DeviceRegistry::new(backend.clone());

        let devices = registry.enumerate().await.unwrap();
        assert!(devices.is_empty());
        assert_eq!(backend.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_enumerate_releases_probe() {
        let backend = Rc::new(MockBackend::new());
        let registry = DeviceRegistry::new(backend.clone());

        let devices = registry.enumerate().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(backend.acquisitions(), 1);
        assert_eq!(backend.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_enumerate_permission_denied() {
        let backend = Rc::new(MockBackend::new().denying_permission());
        let registry = DeviceRegistry::new(backend);
        assert!(matches!(
            registry.enumerate().await,
            Err(DeviceError::PermissionDenied)
        ));
    }

    fn devices_strategy() -> impl Strategy<Value = Vec<Device>> {
        prop::collection::vec("(Front|Back|Rear|USB|Integrated)?[ a-zA-Z]{0,6}", 0..8).prop_map(
            |labels| {
                labels
                    .into_iter()
                    .enumerate()
                    .map(|(i, label)| Device::new(format!("dev{i}"), label))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_pick_default_deterministic(devices in devices_strategy()) {
            let first = pick_default(&devices).map(str::to_owned);
            let second = pick_default(&devices).map(str::to_owned);
            prop_assert_eq!(&first, &second);

            match first {
                None => prop_assert!(devices.is_empty()),
                Some(id) => {
                    let chosen = devices.iter().position(|d| d.id() == id).unwrap();
                    // Nothing rear-facing comes before the chosen device
                    prop_assert!(devices[..chosen].iter().all(|d| !d.is_rear_facing()));
                    prop_assert!(devices[chosen].is_rear_facing() || chosen == 0);
                }
            }
        }
    }
}
