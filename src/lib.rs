//! # rt-detect
//!
//! A real-time object-detection inference pipeline: an isolated worker that
//! receives video frames, runs an ONNX detection model over them, and emits a
//! filtered list of bounding-box detections with class labels and confidence
//! scores.
//!
//! ## Components
//!
//! - **Resource tracking**: every tensor buffer created during a frame cycle
//!   is registered in a scope and released when the cycle ends
//! - **Model management**: load and hot-swap model artifacts with a warm-up
//!   inference before the first real frame
//! - **Preprocessing**: raw RGB frames to normalized `[1, side, side, 3]`
//!   input tensors
//! - **Decoding**: raw model output to confidence-filtered candidates
//! - **Suppression**: class-agnostic non-maximum suppression
//! - **Worker**: a dedicated thread driven by a channel message protocol
//!
//! ## Modules
//!
//! * [`core`] - Configuration, errors, inference engines, buffer tracking
//! * [`processors`] - Per-frame processing stages
//! * [`pipeline`] - Session, worker, and host protocol
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rt_detect::core::PipelineConfig;
//! use rt_detect::pipeline::{HostMessage, PipelineWorker, WorkerEvent};
//! use rt_detect::processors::Frame;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new(
//!     "models/detector.onnx",
//!     vec!["person".to_string(), "car".to_string()],
//! );
//! let (worker, events) = PipelineWorker::spawn_with_ort(config)?;
//!
//! worker.send(HostMessage::LoadModel { model_reference: None })?;
//! worker.send(HostMessage::ProcessFrame {
//!     frame: Frame::new(vec![0u8; 640 * 640 * 3], 640, 640, 0),
//! })?;
//!
//! for event in events.iter() {
//!     match event {
//!         WorkerEvent::ModelLoaded { success, .. } => println!("loaded: {success}"),
//!         WorkerEvent::DetectionResult(result) => {
//!             println!("{} detections", result.len());
//!             break;
//!         }
//!         WorkerEvent::Error { message } => eprintln!("stage failed: {message}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod pipeline;
pub mod processors;

pub use crate::core::{init_tracing, DetectError, PipelineConfig};
pub use crate::pipeline::{DetectionResult, HostMessage, PipelineWorker, WorkerEvent};
pub use crate::processors::Frame;
