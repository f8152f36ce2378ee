//! Synthetic camera platform for tests and demos.

use super::{BackendError, CameraBackend, Device, StreamConstraints, VideoStream};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::sync::Notify;

/// Holds pending operations until opened.
///
/// Lets a test interleave commands with an acquisition or request that
/// has not resolved yet.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    inner: Rc<GateInner>,
}

#[derive(Debug, Default)]
struct GateInner {
    held: Cell<bool>,
    notify: Notify,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent operations wait for [`Gate::open`].
    pub fn hold(&self) {
        self.inner.held.set(true);
    }

    /// Releases every waiting operation and stops holding new ones.
    pub fn open(&self) {
        self.inner.held.set(false);
        self.inner.notify.notify_waiters();
    }

    /// Waits while the gate is held.
    pub async fn pass(&self) {
        while self.inner.held.get() {
            self.inner.notify.notified().await;
        }
    }
}

/// Mock camera platform that produces gradient frames.
#[derive(Debug)]
pub struct MockBackend {
    devices: RefCell<Vec<Device>>,
    deny_permission: bool,
    acquire_failure: Option<String>,
    grab_failure: Option<String>,
    frame_size: (u32, u32),
    gate: Gate,
    live: Rc<Cell<usize>>,
    acquisitions: Cell<usize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::with_devices(vec![
            Device::new("mock-front", "Mock Front Camera"),
            Device::new("mock-back", "Mock Back Camera"),
        ])
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform reporting exactly these devices.
    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            devices: RefCell::new(devices),
            deny_permission: false,
            acquire_failure: None,
            grab_failure: None,
            frame_size: (64, 48),
            gate: Gate::new(),
            live: Rc::new(Cell::new(0)),
            acquisitions: Cell::new(0),
        }
    }

    /// Platform where the user refuses the permission prompt.
    pub fn denying_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Platform where every stream request fails.
    pub fn failing_acquire(mut self, reason: impl Into<String>) -> Self {
        self.acquire_failure = Some(reason.into());
        self
    }

    /// Platform whose streams open but fail every frame read.
    pub fn failing_grab(mut self, reason: impl Into<String>) -> Self {
        self.grab_failure = Some(reason.into());
        self
    }

    /// Removes a device from later listings. Streams already open on it
    /// stay live.
    pub fn unplug(&self, device_id: &str) {
        self.devices.borrow_mut().retain(|d| d.id() != device_id);
    }

    /// Sets the native resolution of produced frames.
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    /// Gate that holds acquisitions while held.
    pub fn gate(&self) -> Gate {
        self.gate.clone()
    }

    /// Streams acquired and not yet released.
    pub fn live_streams(&self) -> usize {
        self.live.get()
    }

    /// Successful acquisitions since creation, probes included.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.get()
    }
}

#[async_trait(?Send)]
impl CameraBackend for MockBackend {
    async fn video_inputs(&self) -> Result<Vec<Device>, BackendError> {
        if self.deny_permission {
            return Err(BackendError::PermissionDenied);
        }
        Ok(self.devices.borrow().clone())
    }

    async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, BackendError> {
        self.gate.pass().await;

        if self.deny_permission {
            return Err(BackendError::PermissionDenied);
        }
        if let Some(ref reason) = self.acquire_failure {
            return Err(BackendError::Unavailable(reason.clone()));
        }

        let devices = self.devices.borrow();
        let device = match constraints.device_id {
            Some(ref id) => devices
                .iter()
                .find(|d| d.id() == id)
                .ok_or_else(|| BackendError::NotFound(id.clone()))?,
            None => devices
                .iter()
                .find(|d| d.is_rear_facing())
                .or_else(|| devices.first())
                .ok_or_else(|| BackendError::NotFound("no video inputs".into()))?,
        };

        self.acquisitions.set(self.acquisitions.get() + 1);
        self.live.set(self.live.get() + 1);
        tracing::debug!(device_id = %device.id(), "MockBackend stream acquired");

        Ok(Box::new(MockStream {
            device_id: device.id().to_owned(),
            width: self.frame_size.0,
            height: self.frame_size.1,
            released: Cell::new(false),
            sequence: Cell::new(0),
            grab_failure: self.grab_failure.clone(),
            live: Rc::clone(&self.live),
        }))
    }
}

struct MockStream {
    device_id: String,
    width: u32,
    height: u32,
    released: Cell<bool>,
    sequence: Cell<u64>,
    grab_failure: Option<String>,
    live: Rc<Cell<usize>>,
}

#[async_trait(?Send)]
impl VideoStream for MockStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn grab(&self) -> Result<RgbImage, BackendError> {
        if self.released.get() {
            return Err(BackendError::Closed);
        }
        if let Some(ref reason) = self.grab_failure {
            return Err(BackendError::Unavailable(reason.clone()));
        }
        let seq = self.sequence.get();
        self.sequence.set(seq + 1);

        // Deterministic gradient, shifted per frame
        let shift = (seq % 256) as u8;
        Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                (x % 256) as u8 ^ shift,
                (y % 256) as u8,
                ((x + y) % 256) as u8,
            ])
        }))
    }

    fn release(&self) {
        if !self.released.replace(true) {
            self.live.set(self.live.get().saturating_sub(1));
        }
    }

    fn is_live(&self) -> bool {
        !self.released.get()
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.release();
    }
}
