//! Error types for the detection pipeline.
//!
//! This module defines the error taxonomy for the pipeline: model loading
//! failures, per-stage processing failures, inference faults, protocol
//! violations, and configuration problems. Every stage error is caught at the
//! worker boundary and converted into an `Error` event rather than crashing
//! the worker thread.

use thiserror::Error;

/// Stage of the per-frame cycle in which a processing error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Frame decoding, resizing, or normalization.
    Preprocess,
    /// Model graph execution.
    Inference,
    /// Raw output row decoding.
    Decode,
    /// Non-maximum suppression.
    Suppression,
    /// Warm-up inference after a model load.
    WarmUp,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Preprocess => write!(f, "preprocess"),
            Stage::Inference => write!(f, "inference"),
            Stage::Decode => write!(f, "decode"),
            Stage::Suppression => write!(f, "suppression"),
            Stage::WarmUp => write!(f, "warm-up"),
        }
    }
}

/// Errors produced by the detection pipeline.
#[derive(Error, Debug)]
pub enum DetectError {
    /// The model artifact could not be loaded or the session could not be
    /// created. Non-fatal: the session transitions to `Failed`.
    #[error("model load failed for '{reference}': {context}")]
    ModelLoad {
        /// Reference (path or URI) of the model that failed to load.
        reference: String,
        /// What went wrong.
        context: String,
        /// Underlying cause, when one exists.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A load was requested while another load was still in progress.
    #[error("model load already in progress")]
    LoadInProgress,

    /// An operation required a `Ready` model but the session was not in that
    /// state.
    #[error("model not ready (state: {state})")]
    NotReady {
        /// The session state at the time of the call.
        state: String,
    },

    /// A per-frame stage failed.
    #[error("{stage} failed: {context}")]
    Processing {
        /// The stage of the cycle where the error occurred.
        stage: Stage,
        /// Additional context about the error.
        context: String,
        /// The underlying error, when one exists.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The frame's declared dimensions do not match its payload.
    #[error("frame payload mismatch: declared {width}x{height} needs {expected} bytes, got {actual}")]
    FramePayload {
        /// Declared frame width in pixels.
        width: u32,
        /// Declared frame height in pixels.
        height: u32,
        /// Byte count implied by the declared dimensions.
        expected: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// A frame cycle exceeded its configured deadline.
    #[error("frame deadline exceeded: {elapsed_ms} ms elapsed, budget {budget_ms} ms")]
    DeadlineExceeded {
        /// Wall time the cycle took, in milliseconds.
        elapsed_ms: u64,
        /// Configured per-frame budget, in milliseconds.
        budget_ms: u64,
    },

    /// A host message could not be understood.
    #[error("protocol: {message}")]
    Protocol {
        /// Description of the unrecognized or malformed message.
        message: String,
    },

    /// Invalid pipeline configuration.
    #[error("configuration: {message}")]
    Config {
        /// Description of the invalid setting.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor shape operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// Error from image decoding.
    #[error("image")]
    Image(#[from] image::ImageError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl DetectError {
    /// Creates a model-load error without an underlying source.
    pub fn model_load(reference: impl Into<String>, context: impl Into<String>) -> Self {
        DetectError::ModelLoad {
            reference: reference.into(),
            context: context.into(),
            source: None,
        }
    }

    /// Creates a model-load error wrapping an underlying cause.
    pub fn model_load_with(
        reference: impl Into<String>,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DetectError::ModelLoad {
            reference: reference.into(),
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a stage error without an underlying source.
    pub fn stage(stage: Stage, context: impl Into<String>) -> Self {
        DetectError::Processing {
            stage,
            context: context.into(),
            source: None,
        }
    }

    /// Creates a stage error wrapping an underlying cause.
    pub fn stage_with(
        stage: Stage,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DetectError::Processing {
            stage,
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        DetectError::Config {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        DetectError::Protocol {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Preprocess.to_string(), "preprocess");
        assert_eq!(Stage::WarmUp.to_string(), "warm-up");
    }

    #[test]
    fn frame_payload_message_names_both_sizes() {
        let err = DetectError::FramePayload {
            width: 4,
            height: 2,
            expected: 24,
            actual: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("24"));
        assert!(msg.contains("20"));
    }
}
