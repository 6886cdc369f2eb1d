//! Core building blocks of the detection pipeline.
//!
//! This module contains the foundation the pipeline stages are built on:
//! - Configuration management
//! - Error handling
//! - Inference engine integration
//! - Tensor buffer lifecycle tracking
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod config;
pub mod errors;
pub mod inference;
pub mod resources;

pub use config::PipelineConfig;
pub use errors::{DetectError, Stage};
pub use inference::{EngineLoader, InferenceEngine, ModelSpec, OrtEngine, OrtEngineLoader};
pub use resources::{ResourceTracker, TensorScope};

/// A `[batch, height, width, channels]` float tensor.
pub type Tensor4D = ndarray::Array4<f32>;

/// Raw model output: one row per anchor/grid cell.
pub type RawOutput = ndarray::Array2<f32>;

/// Initializes the tracing subscriber for logging.
///
/// Sets up the subscriber with an environment filter and a formatting layer.
/// Typically called once at application start.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
