//! Capture-and-analysis orchestration.
//!
//! The orchestrator exposes the UI command surface (`list_devices`,
//! `select_device`, `start_camera`, `stop_camera`,
//! `capture_and_analyze`) and publishes a single [`ScanState`].

mod orchestrator;
mod state;

pub use orchestrator::{Rejected, ScanOrchestrator, DEFAULT_ANALYSIS_DEADLINE};
pub use state::{Controls, ScanState};
