//! Inference engine integration.
//!
//! The pipeline talks to the model graph through the [`InferenceEngine`]
//! trait so that tests can substitute a stub backend. The production engine,
//! [`OrtEngine`], wraps an ONNX Runtime session and accepts detector outputs
//! shaped `[rows, 5 + classes]` or `[1, rows, 5 + classes]`.

use crate::core::errors::{DetectError, Stage};
use crate::core::resources::TensorScope;
use ndarray::{Array2, ArrayView4};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::{TensorRef, ValueType};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Fully resolved description of the model to load.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Path or URI of the model artifact.
    pub reference: String,
    /// Square input resolution, in pixels.
    pub input_side: u32,
    /// Ordered class vocabulary; index = class id.
    pub class_vocabulary: Vec<String>,
}

/// Executes the loaded model graph on a preprocessed input tensor.
pub trait InferenceEngine: Send {
    /// Runs the graph on a `[1, side, side, 3]` tensor and returns the raw
    /// output as one row per anchor/grid cell.
    fn run(&self, input: ArrayView4<f32>) -> Result<Array2<f32>, DetectError>;

    /// The input resolution the graph expects, when the backend can report
    /// it. Used to cross-check the configured `input_side`.
    fn input_side(&self) -> Option<u32> {
        None
    }
}

/// Constructs an [`InferenceEngine`] from a model spec.
///
/// Loaders register the model's parameter buffers with the provided scope so
/// that hot-swap releases them exactly once.
pub trait EngineLoader: Send {
    /// Loads the model named by `spec` and returns a ready engine.
    fn load(
        &self,
        spec: &ModelSpec,
        scope: &mut TensorScope,
    ) -> Result<Box<dyn InferenceEngine>, DetectError>;
}

/// Reshapes a backend output tensor into `[rows, cols]` row-major form.
///
/// Detector heads commonly emit either `[rows, cols]` or a batch-1
/// `[1, rows, cols]`; anything else is an inference error.
pub(crate) fn reshape_raw_output(shape: &[i64], data: &[f32]) -> Result<Array2<f32>, DetectError> {
    let (rows, cols) = match shape {
        [rows, cols] => (*rows, *cols),
        [1, rows, cols] => (*rows, *cols),
        _ => {
            return Err(DetectError::stage(
                Stage::Inference,
                format!("unsupported output shape {shape:?}, expected [rows, cols] or [1, rows, cols]"),
            ));
        }
    };
    if rows < 0 || cols < 0 {
        return Err(DetectError::stage(
            Stage::Inference,
            format!("negative dimension in output shape {shape:?}"),
        ));
    }
    Array2::from_shape_vec((rows as usize, cols as usize), data.to_vec()).map_err(DetectError::from)
}

/// ONNX Runtime inference engine.
pub struct OrtEngine {
    session: Mutex<Session>,
    input_name: String,
    model_name: String,
}

impl std::fmt::Debug for OrtEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEngine")
            .field("input_name", &self.input_name)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl OrtEngine {
    /// Creates an engine from an ONNX model file.
    pub fn from_file(model_path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let path = model_path.as_ref();
        let session = Session::builder()?
            .with_log_level(LogLevel::Error)?
            .commit_from_file(path)
            .map_err(|e| {
                DetectError::model_load_with(
                    path.display().to_string(),
                    "failed to create ONNX session",
                    e,
                )
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "images".to_string());
        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        debug!(model = %model_name, input = %input_name, "ONNX session created");

        Ok(OrtEngine {
            session: Mutex::new(session),
            input_name,
            model_name,
        })
    }

    /// The model name derived from the artifact file stem.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl InferenceEngine for OrtEngine {
    fn run(&self, input: ArrayView4<f32>) -> Result<Array2<f32>, DetectError> {
        let input_shape = input.shape().to_vec();
        let input_tensor = TensorRef::from_array_view(input).map_err(|e| {
            DetectError::stage_with(
                Stage::Inference,
                format!("failed to convert input tensor with shape {input_shape:?}"),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let mut session = self.session.lock().map_err(|_| {
            DetectError::stage(Stage::Inference, "failed to acquire session lock")
        })?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| {
                DetectError::stage(Stage::Inference, "model session reports no outputs")
            })?;

        let outputs = session.run(inputs).map_err(|e| {
            DetectError::stage_with(
                Stage::Inference,
                format!(
                    "graph execution failed for '{}' with input '{}'",
                    self.model_name, self.input_name
                ),
                e,
            )
        })?;

        let (shape, data) = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                DetectError::stage_with(
                    Stage::Inference,
                    format!("failed to extract output tensor '{output_name}' as f32"),
                    e,
                )
            })?;

        reshape_raw_output(shape, data)
    }

    fn input_side(&self) -> Option<u32> {
        let session = self.session.lock().ok()?;
        let input = session.inputs.first()?;
        match &input.input_type {
            ValueType::Tensor { shape, .. } => {
                let dims: Vec<i64> = shape.iter().copied().collect();
                // NHWC [1, side, side, 3] with a static square side.
                if dims.len() == 4 && dims[1] > 0 && dims[1] == dims[2] {
                    Some(dims[1] as u32)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Loads [`OrtEngine`] instances from model files on disk.
#[derive(Debug, Default)]
pub struct OrtEngineLoader;

impl EngineLoader for OrtEngineLoader {
    fn load(
        &self,
        spec: &ModelSpec,
        scope: &mut TensorScope,
    ) -> Result<Box<dyn InferenceEngine>, DetectError> {
        let artifact_bytes = std::fs::metadata(&spec.reference)
            .map(|m| m.len() as usize)
            .map_err(|e| {
                DetectError::model_load_with(&spec.reference, "model artifact not readable", e)
            })?;
        let engine = OrtEngine::from_file(&spec.reference)?;

        if let Some(side) = engine.input_side() {
            if side != spec.input_side {
                return Err(DetectError::model_load(
                    &spec.reference,
                    format!(
                        "model expects input side {side}, configuration says {}",
                        spec.input_side
                    ),
                ));
            }
        }

        // ort does not expose per-tensor device allocations; the session's
        // parameter arena is tracked as a single buffer sized by the artifact.
        scope.register(format!("{} parameters", engine.model_name()), artifact_bytes);
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reshape_accepts_two_dim_output() {
        let data = vec![0.0f32; 12];
        let raw = reshape_raw_output(&[2, 6], &data).unwrap();
        assert_eq!(raw.shape(), &[2, 6]);
    }

    #[test]
    fn reshape_strips_unit_batch_dim() {
        let data = vec![0.0f32; 12];
        let raw = reshape_raw_output(&[1, 2, 6], &data).unwrap();
        assert_eq!(raw.shape(), &[2, 6]);
    }

    #[test]
    fn reshape_rejects_other_ranks() {
        let data = vec![0.0f32; 12];
        assert!(reshape_raw_output(&[12], &data).is_err());
        assert!(reshape_raw_output(&[2, 2, 3, 1], &data).is_err());
        assert!(reshape_raw_output(&[3, 2, 2], &data).is_err());
    }

    #[test]
    fn reshape_rejects_mismatched_payload() {
        let data = vec![0.0f32; 10];
        assert!(reshape_raw_output(&[2, 6], &data).is_err());
    }
}
