//! Pipeline session: model lifecycle and the per-frame cycle.
//!
//! A [`PipelineSession`] owns the single active model and everything needed
//! to turn a frame into a [`DetectionResult`]. It is an explicit struct
//! rather than module-level state, so independent pipelines can coexist (one
//! per worker, or several in tests).
//!
//! Model lifecycle: `Unloaded -> Loading -> Ready | Failed`. A hot-swap
//! releases the previous model's parameter buffers before the new load
//! begins, and every successful load runs one warm-up inference on a
//! zero-filled tensor so backend compilation cost is paid before the first
//! real frame.

use crate::core::config::PipelineConfig;
use crate::core::errors::{DetectError, Stage};
use crate::core::inference::{EngineLoader, InferenceEngine, ModelSpec, OrtEngineLoader};
use crate::core::resources::ResourceTracker;
use crate::core::Tensor4D;
use crate::pipeline::protocol::DetectionResult;
use crate::processors::decode::DetectionDecoder;
use crate::processors::nms::SuppressionEngine;
use crate::processors::preprocess::FramePreprocessor;
use crate::processors::types::Frame;
use std::time::Instant;
use tracing::{debug, info};

/// Lifecycle state of the session's model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// No model has been loaded yet.
    Unloaded,
    /// A load is in progress.
    Loading,
    /// The model is loaded and warmed up; frames can be processed.
    Ready,
    /// The last load attempt failed.
    Failed,
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Unloaded => write!(f, "unloaded"),
            ModelState::Loading => write!(f, "loading"),
            ModelState::Ready => write!(f, "ready"),
            ModelState::Failed => write!(f, "failed"),
        }
    }
}

struct LoadedModel {
    engine: Box<dyn InferenceEngine>,
    spec: ModelSpec,
    // Dropping the scope releases the parameter buffers exactly once.
    _param_scope: crate::core::resources::TensorScope,
}

/// One detection pipeline instance: the active model plus the processing
/// stages, owned by a single worker.
pub struct PipelineSession {
    config: PipelineConfig,
    loader: Box<dyn EngineLoader>,
    tracker: ResourceTracker,
    preprocessor: FramePreprocessor,
    decoder: DetectionDecoder,
    suppressor: SuppressionEngine,
    state: ModelState,
    loading: bool,
    model: Option<LoadedModel>,
    last_reference: String,
}

impl PipelineSession {
    /// Creates a session with a custom engine loader.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn new(config: PipelineConfig, loader: Box<dyn EngineLoader>) -> Result<Self, DetectError> {
        config.validate()?;
        let preprocessor = FramePreprocessor::new(config.input_side);
        let decoder = DetectionDecoder::new(config.confidence_threshold);
        let suppressor = SuppressionEngine::new(config.iou_threshold);
        let last_reference = config.model_reference.clone();
        Ok(Self {
            config,
            loader,
            tracker: ResourceTracker::new(),
            preprocessor,
            decoder,
            suppressor,
            state: ModelState::Unloaded,
            loading: false,
            model: None,
            last_reference,
        })
    }

    /// Creates a session backed by ONNX Runtime.
    pub fn with_ort_loader(config: PipelineConfig) -> Result<Self, DetectError> {
        Self::new(config, Box::new(OrtEngineLoader))
    }

    /// Current model lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// The buffer census shared by every stage of this session.
    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    /// Loads a model, hot-swapping any model that is already `Ready`.
    ///
    /// With no `reference`, the last configured one is reused. The previous
    /// model's buffers are released before the new load begins, so a failed
    /// load leaves the session `Failed` with no model rather than falling
    /// back to the old one.
    ///
    /// # Errors
    ///
    /// Returns `LoadInProgress` if a load is already running, or a
    /// model-load error if the artifact cannot be loaded or warm-up fails.
    pub fn load(&mut self, reference: Option<&str>) -> Result<(), DetectError> {
        if self.loading {
            return Err(DetectError::LoadInProgress);
        }
        let reference = reference.unwrap_or(&self.last_reference).to_string();
        if reference.is_empty() {
            return Err(DetectError::model_load(
                reference,
                "no model reference configured",
            ));
        }

        self.loading = true;
        if self.model.take().is_some() {
            info!(reference = %self.last_reference, "released previous model for hot-swap");
        }
        self.state = ModelState::Loading;
        info!(reference = %reference, "loading model");

        let result = self.do_load(&reference);
        self.loading = false;
        match result {
            Ok(model) => {
                self.model = Some(model);
                self.state = ModelState::Ready;
                self.last_reference = reference;
                info!(reference = %self.last_reference, "model ready");
                Ok(())
            }
            Err(e) => {
                self.state = ModelState::Failed;
                Err(e)
            }
        }
    }

    fn do_load(&mut self, reference: &str) -> Result<LoadedModel, DetectError> {
        let spec = ModelSpec {
            reference: reference.to_string(),
            input_side: self.config.input_side,
            class_vocabulary: self.config.class_vocabulary.clone(),
        };
        let mut param_scope = self.tracker.scope(format!("model {reference}"));
        let engine = self.loader.load(&spec, &mut param_scope)?;
        self.warm_up(engine.as_ref())?;
        Ok(LoadedModel {
            engine,
            spec,
            _param_scope: param_scope,
        })
    }

    /// Runs one throwaway inference on a zero tensor so one-time backend
    /// compilation happens now instead of on the first real frame.
    fn warm_up(&self, engine: &dyn InferenceEngine) -> Result<(), DetectError> {
        let side = self.config.input_side as usize;
        let mut scope = self.tracker.scope("warm-up");
        let zeros = Tensor4D::zeros((1, side, side, 3));
        scope.register("warm-up tensor", zeros.len() * std::mem::size_of::<f32>());

        let started = Instant::now();
        engine.run(zeros.view()).map_err(|e| {
            DetectError::stage_with(Stage::WarmUp, "warm-up inference failed", e)
        })?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "warm-up complete");
        Ok(())
    }

    /// Runs the full cycle over one frame: preprocess, infer, decode,
    /// suppress. Buffers created during the cycle are released when it ends,
    /// on success and error paths alike.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` unless the model state is `Ready`, a stage error if
    /// any stage fails, or `DeadlineExceeded` if the cycle overran the
    /// configured per-frame budget (the result is discarded).
    pub fn process_frame(&self, frame: Frame) -> Result<DetectionResult, DetectError> {
        if self.state != ModelState::Ready {
            return Err(DetectError::NotReady {
                state: self.state.to_string(),
            });
        }
        let Some(model) = self.model.as_ref() else {
            return Err(DetectError::NotReady {
                state: self.state.to_string(),
            });
        };

        let started = Instant::now();
        let timestamp_ms = frame.timestamp_ms;
        let mut scope = self.tracker.scope("frame cycle");

        let tensor = self.preprocessor.preprocess(frame, &mut scope)?;
        let raw = model.engine.run(tensor.view())?;
        scope.register("raw output", raw.len() * std::mem::size_of::<f32>());

        let candidates = self.decoder.decode(&raw);
        let mut survivors = self.suppressor.suppress(candidates);
        survivors.truncate(self.config.max_detections);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(budget_ms) = self.config.frame_deadline_ms {
            if elapsed_ms > budget_ms {
                return Err(DetectError::DeadlineExceeded {
                    elapsed_ms,
                    budget_ms,
                });
            }
        }

        let result =
            DetectionResult::from_candidates(&survivors, &model.spec.class_vocabulary, timestamp_ms);
        debug!(
            elapsed_ms,
            detections = result.len(),
            confidence = result.confidence,
            "frame cycle complete"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for PipelineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSession")
            .field("state", &self.state)
            .field("last_reference", &self.last_reference)
            .field("live_buffers", &self.tracker.live_buffers())
            .finish()
    }
}
