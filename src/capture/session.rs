//! Lifecycle of one exclusive camera stream.
//!
//! A session owns its stream outright. Other components read frames
//! through the session or a [`StreamPreview`], and neither can release
//! the stream.
//!
//! Every `start` and `stop` advances a generation counter. An
//! acquisition that resolves after the generation moved on releases the
//! stream it got and reports [`SessionError::Superseded`], so a late
//! stream from an abandoned `start` never reopens the session.

use super::{BackendError, CameraBackend, StreamConstraints, VideoStream};
use crate::error::ErrorKind;
use image::RgbImage;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use thiserror::Error;

/// Status of a camera session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Closed,
    Opening,
    Active,
    Failed(String),
}

/// Errors that can occur during session operations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("camera session is not active")]
    SessionNotActive,
    #[error("camera start superseded by a later stop or start")]
    Superseded,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::CameraUnavailable(_) | SessionError::Superseded => {
                ErrorKind::CameraUnavailable
            }
            SessionError::SessionNotActive => ErrorKind::SessionNotActive,
        }
    }
}

struct SessionInner {
    status: SessionStatus,
    device_id: Option<String>,
    stream: Option<Rc<dyn VideoStream>>,
    generation: u64,
}

/// An exclusive binding to one camera's live stream.
pub struct CameraSession {
    backend: Rc<dyn CameraBackend>,
    constraints: StreamConstraints,
    inner: RefCell<SessionInner>,
}

impl CameraSession {
    /// Creates a closed session that opens streams with `constraints`.
    pub fn new(backend: Rc<dyn CameraBackend>, constraints: StreamConstraints) -> Self {
        Self {
            backend,
            constraints,
            inner: RefCell::new(SessionInner {
                status: SessionStatus::Closed,
                device_id: None,
                stream: None,
                generation: 0,
            }),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.borrow().status.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.borrow().status == SessionStatus::Active
    }

    /// Device requested by the latest `start`.
    pub fn device_id(&self) -> Option<String> {
        self.inner.borrow().device_id.clone()
    }

    /// Current lifecycle generation.
    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    /// Opens a stream, pinned to `device_id` when given.
    ///
    /// Any stream still held is released first.
    pub async fn start(&self, device_id: Option<&str>) -> Result<(), SessionError> {
        let generation = {
            let mut inner = self.inner.borrow_mut();
            if let Some(stream) = inner.stream.take() {
                tracing::warn!(device_id = %stream.device_id(), "Releasing stream left open before restart");
                stream.release();
            }
            inner.generation += 1;
            inner.status = SessionStatus::Opening;
            inner.device_id = device_id.map(str::to_owned);
            inner.generation
        };

        let constraints = self.constraints.for_device(device_id);
        let outcome = self.backend.acquire(&constraints).await;

        let mut inner = self.inner.borrow_mut();
        if inner.generation != generation {
            if let Ok(stream) = outcome {
                stream.release();
            }
            tracing::debug!(generation, "Discarding stale stream acquisition");
            return Err(SessionError::Superseded);
        }

        match outcome {
            Ok(stream) => {
                tracing::info!(device_id = %stream.device_id(), "Camera session active");
                inner.stream = Some(Rc::from(stream));
                inner.status = SessionStatus::Active;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Camera session failed to open");
                inner.status = SessionStatus::Failed(err.to_string());
                Err(SessionError::CameraUnavailable(err.to_string()))
            }
        }
    }

    /// Releases the stream and closes the session.
    ///
    /// Safe to call in any status, any number of times, including while
    /// a `start` is still pending.
    pub fn stop(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.status == SessionStatus::Closed && inner.stream.is_none() {
            return;
        }
        if let Some(stream) = inner.stream.take() {
            stream.release();
            tracing::info!(device_id = %stream.device_id(), "Camera session closed");
        }
        inner.generation += 1;
        inner.status = SessionStatus::Closed;
    }

    /// Reads the current frame from the active stream.
    ///
    /// Fails with `SessionNotActive` if the session is not active, or if
    /// it was stopped or restarted while the read was outstanding.
    pub async fn read_frame(&self) -> Result<RgbImage, SessionError> {
        let (stream, generation) = {
            let inner = self.inner.borrow();
            match (&inner.status, &inner.stream) {
                (SessionStatus::Active, Some(stream)) => (Rc::clone(stream), inner.generation),
                _ => return Err(SessionError::SessionNotActive),
            }
        };

        let grabbed = stream.grab().await;
        if self.generation() != generation {
            return Err(SessionError::SessionNotActive);
        }
        grabbed.map_err(|err| match err {
            BackendError::Closed => SessionError::SessionNotActive,
            other => SessionError::CameraUnavailable(other.to_string()),
        })
    }

    /// Read-only view of the live stream for display binding.
    pub fn preview(&self) -> Option<StreamPreview> {
        let inner = self.inner.borrow();
        match inner.status {
            SessionStatus::Active => inner.stream.as_ref().map(|s| StreamPreview {
                stream: Rc::downgrade(s),
            }),
            _ => None,
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("CameraSession")
            .field("status", &inner.status)
            .field("device_id", &inner.device_id)
            .field("generation", &inner.generation)
            .finish()
    }
}

/// Display handle for an active session.
///
/// Stops yielding frames once the session releases its stream.
#[derive(Clone)]
pub struct StreamPreview {
    stream: Weak<dyn VideoStream>,
}

impl StreamPreview {
    /// Reads the latest frame for display.
    pub async fn frame(&self) -> Option<RgbImage> {
        let stream = self.stream.upgrade()?;
        if !stream.is_live() {
            return None;
        }
        stream.grab().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockBackend;

    fn session(backend: &Rc<MockBackend>) -> CameraSession {
        CameraSession::new(backend.clone(), StreamConstraints::default())
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let backend = Rc::new(MockBackend::new());
        let session = session(&backend);

        session.start(Some("mock-front")).await.unwrap();
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.device_id().as_deref(), Some("mock-front"));
        assert_eq!(backend.live_streams(), 1);

        session.stop();
        assert_eq!(session.status(), SessionStatus::Closed);
        assert_eq!(backend.live_streams(), 0);
    }

    #[test]
    fn test_stop_idempotent_when_never_started() {
        let backend = Rc::new(MockBackend::new());
        let session = session(&backend);

        session.stop();
        assert_eq!(session.status(), SessionStatus::Closed);
        session.stop();
        assert_eq!(session.status(), SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_stop_twice_after_start() {
        let backend = Rc::new(MockBackend::new());
        let session = session(&backend);

        session.start(None).await.unwrap();
        session.stop();
        session.stop();
        assert_eq!(session.status(), SessionStatus::Closed);
        assert_eq!(backend.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_failed_start_leaves_no_handle() {
        let backend = Rc::new(MockBackend::new().failing_acquire("device busy"));
        let session = session(&backend);

        let err = session.start(Some("mock-back")).await.unwrap_err();
        assert!(matches!(err, SessionError::CameraUnavailable(_)));
        assert!(matches!(session.status(), SessionStatus::Failed(_)));
        assert!(session.preview().is_none());

        session.stop();
        assert_eq!(session.status(), SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_stop_during_pending_start_discards_stream() {
        let backend = Rc::new(MockBackend::new());
        let gate = backend.gate();
        let session = session(&backend);
        gate.hold();

        let (started, ()) = tokio::join!(session.start(Some("mock-back")), async {
            assert_eq!(session.status(), SessionStatus::Opening);
            session.stop();
            gate.open();
        });

        assert!(matches!(started, Err(SessionError::Superseded)));
        assert_eq!(session.status(), SessionStatus::Closed);
        assert_eq!(backend.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_read_frame_requires_active() {
        let backend = Rc::new(MockBackend::new());
        let session = session(&backend);
        assert!(matches!(
            session.read_frame().await,
            Err(SessionError::SessionNotActive)
        ));
    }

    #[tokio::test]
    async fn test_restart_keeps_single_stream() {
        let backend = Rc::new(MockBackend::new());
        let session = session(&backend);

        session.start(Some("mock-front")).await.unwrap();
        session.start(Some("mock-back")).await.unwrap();
        assert_eq!(backend.live_streams(), 1);
        assert_eq!(session.device_id().as_deref(), Some("mock-back"));
    }

    #[tokio::test]
    async fn test_preview_goes_dark_after_stop() {
        let backend = Rc::new(MockBackend::new());
        let session = session(&backend);
        session.start(None).await.unwrap();

        let preview = session.preview().unwrap();
        assert!(preview.frame().await.is_some());

        session.stop();
        assert!(preview.frame().await.is_none());
    }
}
