//! The scan state machine.
//!
//! Commands take `&self` so the UI can issue one while another is still
//! awaiting the camera or the network. The orchestrator lives on a
//! single event thread; ordering comes from the state machine and a
//! generation counter, not from locks.
//!
//! Each command that can be superseded records the generation it
//! started in. A stop, restart, device change or teardown advances the
//! generation, and any result that comes back afterwards is dropped.
//! Analysis stays single-flight across those changes: a new capture is
//! rejected until the previous analysis call has resolved.

use super::{Controls, ScanState};
use crate::analysis::{AnalysisError, Analyzer};
use crate::capture::{
    pick_default, CameraBackend, CameraConfig, CameraSession, Device, DeviceError, DeviceRegistry,
    FrameCapture, SessionError, SessionStatus, StreamPreview,
};
use crate::error::{ErrorKind, RetryAction};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Default bound on one analysis, after which it counts as a network failure.
pub const DEFAULT_ANALYSIS_DEADLINE: Duration = Duration::from_secs(45);

/// A command that the current state does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{command} rejected while {state}")]
pub struct Rejected {
    pub command: &'static str,
    pub state: &'static str,
}

/// Composes device listing, the camera session, capture and analysis.
pub struct ScanOrchestrator {
    registry: DeviceRegistry,
    session: CameraSession,
    capture: FrameCapture,
    analyzer: Rc<dyn Analyzer>,
    analysis_deadline: Duration,
    devices: RefCell<Vec<Device>>,
    selected: RefCell<Option<String>>,
    generation: Cell<u64>,
    analysis_in_flight: Cell<bool>,
    state: watch::Sender<ScanState>,
}

/// Marks an analysis call as outstanding until dropped.
struct InFlight<'a>(&'a Cell<bool>);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ScanOrchestrator {
    /// Creates an idle orchestrator with default camera settings.
    pub fn new(backend: Rc<dyn CameraBackend>, analyzer: Rc<dyn Analyzer>) -> Self {
        Self::with_config(backend, analyzer, &CameraConfig::default())
    }

    /// Creates an idle orchestrator with the given camera settings.
    pub fn with_config(
        backend: Rc<dyn CameraBackend>,
        analyzer: Rc<dyn Analyzer>,
        camera: &CameraConfig,
    ) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            registry: DeviceRegistry::new(Rc::clone(&backend)),
            session: CameraSession::new(backend, camera.constraints()),
            capture: FrameCapture::new(camera.jpeg_quality),
            analyzer,
            analysis_deadline: DEFAULT_ANALYSIS_DEADLINE,
            devices: RefCell::new(Vec::new()),
            selected: RefCell::new(None),
            generation: Cell::new(0),
            analysis_in_flight: Cell::new(false),
            state,
        }
    }

    /// Sets how long an analysis may run before it fails.
    pub fn with_analysis_deadline(mut self, deadline: Duration) -> Self {
        self.analysis_deadline = deadline;
        self
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every state change.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    /// Commands the UI should enable right now.
    ///
    /// Same as the state's controls, except that capture stays disabled
    /// while an earlier analysis call is still outstanding, even one whose
    /// result will be discarded.
    pub fn controls(&self) -> Controls {
        let mut controls = self.state.borrow().controls();
        if self.analysis_in_flight.get() {
            controls.can_capture = false;
        }
        controls
    }

    /// True while an analysis call has not resolved.
    pub fn is_analysis_in_flight(&self) -> bool {
        self.analysis_in_flight.get()
    }

    /// Devices from the last successful listing.
    pub fn devices(&self) -> Vec<Device> {
        self.devices.borrow().clone()
    }

    pub fn selected_device(&self) -> Option<String> {
        self.selected.borrow().clone()
    }

    pub fn session_status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Display handle for the live camera, if any.
    pub fn preview(&self) -> Option<StreamPreview> {
        self.session.preview()
    }

    /// Lists cameras and selects a default.
    ///
    /// Failures are logged and returned but leave the state alone, so
    /// the start control simply stays disabled.
    pub async fn list_devices(&self) -> Result<Vec<Device>, DeviceError> {
        let listed = if self.camera_open() {
            self.registry.list().await
        } else {
            self.registry.enumerate().await
        };

        let devices = match listed {
            Ok(devices) => devices,
            Err(err) => {
                match err {
                    DeviceError::PermissionDenied => tracing::warn!("Camera permission denied"),
                    ref other => tracing::warn!(error = %other, "Device enumeration failed"),
                }
                return Err(err);
            }
        };

        *self.devices.borrow_mut() = devices.clone();
        if devices.is_empty() {
            tracing::warn!("No cameras found");
            return Err(DeviceError::NoDeviceFound);
        }

        // An open session pins the selection to the device it streams from
        let keep = self.camera_open()
            || self
                .selected
                .borrow()
                .as_deref()
                .is_some_and(|id| devices.iter().any(|d| d.id() == id));
        if !keep {
            *self.selected.borrow_mut() = pick_default(&devices).map(str::to_owned);
        }

        let camera_closed = match self.state() {
            ScanState::Idle | ScanState::Ready { .. } => true,
            ScanState::Error { kind, .. } => {
                matches!(kind, ErrorKind::PermissionDenied | ErrorKind::NoDeviceFound)
            }
            _ => false,
        };
        if camera_closed {
            if let Some(device_id) = self.selected_device() {
                self.set_state(ScanState::Ready { device_id });
            }
        }

        tracing::info!(count = devices.len(), selected = ?self.selected_device(), "Devices listed");
        Ok(devices)
    }

    /// Chooses the camera to use, closing any open one first.
    pub fn select_device(&self, device_id: &str) -> Result<(), Rejected> {
        if !self.devices.borrow().iter().any(|d| d.id() == device_id) {
            return Err(self.rejected("select_device"));
        }
        if self.camera_open() {
            self.stop_camera();
        }
        self.advance();
        *self.selected.borrow_mut() = Some(device_id.to_owned());
        self.set_state(ScanState::Ready {
            device_id: device_id.to_owned(),
        });
        tracing::info!(%device_id, "Device selected");
        Ok(())
    }

    /// Opens the selected camera.
    ///
    /// The command is accepted when the state allows it; the outcome
    /// shows up as `Scanning` or a recoverable `Error`.
    pub async fn start_camera(&self) -> Result<(), Rejected> {
        if !self.state().controls().can_start || self.session.status() == SessionStatus::Opening {
            return Err(self.rejected("start_camera"));
        }
        let Some(device_id) = self.selected_device() else {
            return Err(self.rejected("start_camera"));
        };

        let generation = self.advance();
        self.session.stop();
        // Opening shows as Ready; this also clears any previous result
        self.set_state(ScanState::Ready {
            device_id: device_id.clone(),
        });

        match self.session.start(Some(&device_id)).await {
            Ok(()) if self.is_current(generation) => {
                self.set_state(ScanState::Scanning { device_id });
            }
            Ok(()) => {
                tracing::debug!(generation, "Discarding superseded camera start");
            }
            Err(SessionError::Superseded) => {
                tracing::debug!(generation, "Camera start superseded");
            }
            Err(err) if self.is_current(generation) => {
                tracing::warn!(error = %err, "Camera start failed");
                self.set_state(ScanState::error(err.kind(), err.to_string()));
            }
            Err(err) => {
                tracing::debug!(error = %err, "Discarding stale camera failure");
            }
        }
        Ok(())
    }

    /// Closes the camera. Always succeeds, in any state.
    pub fn stop_camera(&self) {
        self.advance();
        self.session.stop();
        let next = match self.selected_device() {
            Some(device_id) => ScanState::Ready { device_id },
            None => ScanState::Idle,
        };
        self.set_state(next);
    }

    /// Captures a still and sends it for analysis.
    ///
    /// Rejected while another capture or analysis is outstanding.
    pub async fn capture_and_analyze(&self) -> Result<(), Rejected> {
        if !self.controls().can_capture {
            return Err(self.rejected("capture_and_analyze"));
        }

        let generation = self.advance();
        self.set_state(ScanState::Capturing);

        let frame = match self.capture.capture(&self.session).await {
            Ok(frame) => frame,
            Err(err) => {
                if self.is_current(generation) {
                    tracing::warn!(error = %err, "Capture failed");
                    self.set_state(self.failure_state(err.kind(), err.to_string()));
                }
                return Ok(());
            }
        };
        if !self.is_current(generation) {
            tracing::debug!(sequence = frame.sequence(), "Discarding frame from superseded capture");
            return Ok(());
        }

        self.set_state(ScanState::Analyzing);
        let sequence = frame.sequence();
        let outcome = {
            let _in_flight = InFlight::enter(&self.analysis_in_flight);
            match tokio::time::timeout(self.analysis_deadline, self.analyzer.analyze(frame)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AnalysisError::NetworkFailure(format!(
                    "no response within {:?}",
                    self.analysis_deadline
                ))),
            }
        };

        if !self.is_current(generation) {
            tracing::debug!(sequence, "Discarding superseded analysis");
            return Ok(());
        }

        match outcome {
            Ok(result) => {
                tracing::info!(
                    sequence,
                    food = %result.food_name,
                    confidence = result.confidence,
                    calories = result.calories,
                    "Analysis complete"
                );
                self.set_state(ScanState::Result(result));
            }
            Err(err) => {
                tracing::warn!(sequence, error = %err, "Analysis failed");
                self.set_state(self.failure_state(err.kind(), format!("Analysis failed: {}", err)));
            }
        }
        Ok(())
    }

    /// Teardown hook for the owning UI; closes the camera whatever the state.
    pub fn shutdown(&self) {
        self.stop_camera();
        tracing::info!("Scan orchestrator shut down");
    }

    /// Error state after a failed capture or analysis.
    ///
    /// While the stream is still live the retry is another capture.
    fn failure_state(&self, kind: ErrorKind, reason: String) -> ScanState {
        if self.session.is_active() {
            ScanState::error_with_retry(kind, reason, RetryAction::Capture)
        } else {
            ScanState::error(kind, reason)
        }
    }

    fn camera_open(&self) -> bool {
        matches!(
            self.session.status(),
            SessionStatus::Active | SessionStatus::Opening
        )
    }

    fn advance(&self) -> u64 {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        next
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation
    }

    fn set_state(&self, next: ScanState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = previous.name(), to = self.state.borrow().name(), "Scan state changed");
    }

    fn rejected(&self, command: &'static str) -> Rejected {
        let rejected = Rejected {
            command,
            state: self.state.borrow().name(),
        };
        tracing::debug!(%rejected, "Command rejected");
        rejected
    }
}
