//! Food Scanner Library
//!
//! Points a camera at food, captures a still, sends it to a remote
//! image-understanding service and reports nutrition facts.
//!
//! # Architecture
//!
//! The scan flow runs on one event thread:
//!
//! ```text
//! DeviceRegistry → CameraSession → FrameCapture → Analyzer
//!        ↘               ↓               ↓          ↙
//!                  ScanOrchestrator (ScanState)
//! ```
//!
//! The `server` feature adds the analysis endpoint the client talks to,
//! which forwards images to a multimodal model.
//!
//! # Design Principles
//!
//! - **One live camera**: a session owns its stream; only it can release it
//! - **Single-flight**: one capture-and-analyze at a time
//! - **Stale results are dropped**: every superseded operation is tagged
//!   with a generation and its late result discarded
//! - **Nothing is fatal**: every failure becomes a recoverable state
//!
//! # Example
//!
//! ```no_run
//! use food_scanner::{
//!     analysis::{AnalysisResult, MockAnalyzer},
//!     capture::MockBackend,
//!     scan::{ScanOrchestrator, ScanState},
//! };
//! use std::rc::Rc;
//!
//! # async fn example() {
//! let analyzer = MockAnalyzer::returning(AnalysisResult {
//!     food_name: "apple".into(),
//!     confidence: 0.9,
//!     calories: 52.0,
//!     protein: 0.3,
//!     carbs: 14.0,
//!     fats: 0.2,
//! });
//! let scan = ScanOrchestrator::new(Rc::new(MockBackend::new()), Rc::new(analyzer));
//!
//! scan.list_devices().await.unwrap();
//! scan.start_camera().await.unwrap();
//! scan.capture_and_analyze().await.unwrap();
//!
//! if let ScanState::Result(result) = scan.state() {
//!     println!("{}: {} kcal", result.food_name, result.calories);
//! }
//! scan.shutdown();
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod capture;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scan;
#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types at crate root
pub use analysis::{AnalysisError, AnalysisResult, Analyzer, HttpAnalysisClient};
pub use capture::{CameraBackend, CameraSession, CapturedFrame, Device, FrameCapture};
pub use config::FileConfig;
pub use error::ErrorKind;
pub use scan::{ScanOrchestrator, ScanState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
