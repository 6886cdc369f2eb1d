//! Per-frame processing stages.
//!
//! # Modules
//!
//! * `preprocess` - Raw frame to normalized input tensor
//! * `decode` - Raw model output to confidence-filtered candidates
//! * `nms` - Non-maximum suppression over candidates
//! * `types` - Shared detection types

pub mod decode;
pub mod nms;
pub mod preprocess;
pub mod types;

pub use decode::DetectionDecoder;
pub use nms::{iou, SuppressionEngine};
pub use preprocess::FramePreprocessor;
pub use types::{BoundingBox, DetectionCandidate, Frame};
