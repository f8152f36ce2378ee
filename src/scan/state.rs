//! Observable scan state and the controls it implies.

use crate::analysis::AnalysisResult;
use crate::error::{ErrorKind, RetryAction};
use serde::Serialize;

/// Where the scan flow currently is.
///
/// Exactly one value is live per orchestrator. Every UI affordance is a
/// function of this value alone; see [`ScanState::controls`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanState {
    /// No camera chosen yet.
    Idle,
    /// A camera is chosen but not streaming.
    Ready { device_id: String },
    /// The camera is live and bound for display.
    Scanning { device_id: String },
    /// A still is being grabbed.
    Capturing,
    /// A still is with the analysis service.
    Analyzing,
    /// The latest analysis.
    Result(AnalysisResult),
    /// The last operation failed.
    Error {
        kind: ErrorKind,
        reason: String,
        recoverable: bool,
        /// Command that retries the failed operation.
        retry: RetryAction,
    },
}

/// Which commands the UI should enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Controls {
    pub can_list: bool,
    pub can_start: bool,
    pub can_stop: bool,
    pub can_capture: bool,
}

impl ScanState {
    pub(crate) fn error(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self::error_with_retry(kind, reason, kind.retry_action())
    }

    /// Error whose retry is decided by the caller, e.g. a failed capture on
    /// a still-active session retries the capture, whatever its kind.
    pub(crate) fn error_with_retry(
        kind: ErrorKind,
        reason: impl Into<String>,
        retry: RetryAction,
    ) -> Self {
        ScanState::Error {
            kind,
            reason: reason.into(),
            recoverable: kind.is_recoverable(),
            retry,
        }
    }

    /// Short name for logs and rejections.
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Ready { .. } => "ready",
            ScanState::Scanning { .. } => "scanning",
            ScanState::Capturing => "capturing",
            ScanState::Analyzing => "analyzing",
            ScanState::Result(_) => "result",
            ScanState::Error { .. } => "error",
        }
    }

    /// True while a capture or analysis is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, ScanState::Capturing | ScanState::Analyzing)
    }

    /// Commands that make sense from this state.
    pub fn controls(&self) -> Controls {
        match self {
            ScanState::Idle => Controls {
                can_list: true,
                ..Controls::default()
            },
            ScanState::Ready { .. } => Controls {
                can_list: true,
                can_start: true,
                ..Controls::default()
            },
            ScanState::Scanning { .. } | ScanState::Result(_) => Controls {
                can_list: true,
                can_stop: true,
                can_capture: true,
                ..Controls::default()
            },
            ScanState::Capturing | ScanState::Analyzing => Controls {
                can_stop: true,
                ..Controls::default()
            },
            ScanState::Error { retry, .. } => match retry {
                RetryAction::ListDevices => Controls {
                    can_list: true,
                    ..Controls::default()
                },
                RetryAction::StartCamera => Controls {
                    can_list: true,
                    can_start: true,
                    ..Controls::default()
                },
                RetryAction::Capture => Controls {
                    can_list: true,
                    can_stop: true,
                    can_capture: true,
                    ..Controls::default()
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_states_only_allow_stop() {
        for state in [ScanState::Capturing, ScanState::Analyzing] {
            let controls = state.controls();
            assert!(state.is_busy());
            assert!(controls.can_stop);
            assert!(!controls.can_capture);
            assert!(!controls.can_start);
        }
    }

    #[test]
    fn test_idle_disables_start() {
        let controls = ScanState::Idle.controls();
        assert!(controls.can_list);
        assert!(!controls.can_start);
    }

    #[test]
    fn test_error_controls_follow_retry_action() {
        let start_failed = ScanState::error(ErrorKind::CameraUnavailable, "busy");
        assert!(start_failed.controls().can_start);
        assert!(!start_failed.controls().can_capture);

        let analyze_failed = ScanState::error(ErrorKind::NetworkFailure, "timeout");
        assert!(analyze_failed.controls().can_capture);
        assert!(!analyze_failed.controls().can_start);
    }

    #[test]
    fn test_capture_retry_overrides_kind() {
        let grab_failed =
            ScanState::error_with_retry(ErrorKind::CameraUnavailable, "read failed", RetryAction::Capture);
        let controls = grab_failed.controls();
        assert!(controls.can_capture);
        assert!(controls.can_stop);
        assert!(!controls.can_start);
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(ScanState::Ready {
            device_id: "b".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["device_id"], "b");
    }
}
