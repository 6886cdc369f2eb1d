//! Stub inference backends for pipeline tests.

use crate::core::errors::{DetectError, Stage};
use crate::core::inference::{EngineLoader, InferenceEngine, ModelSpec};
use crate::core::resources::TensorScope;
use ndarray::{Array2, ArrayView4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Blocks inference runs (after the warm-up run) until the test releases
/// them, and reports when a run has started.
pub(crate) struct EngineGate {
    /// Signalled when a gated run begins.
    pub started: Sender<()>,
    /// Each gated run waits for one token.
    pub release: Mutex<Receiver<()>>,
}

/// A scripted inference engine that returns fixed raw output rows.
pub(crate) struct StubEngine {
    rows: Vec<Vec<f32>>,
    runs: Arc<AtomicUsize>,
    fail_inference: bool,
    delay: Option<Duration>,
    gate: Option<Arc<EngineGate>>,
}

impl InferenceEngine for StubEngine {
    fn run(&self, _input: ArrayView4<f32>) -> Result<Array2<f32>, DetectError> {
        let run_idx = self.runs.fetch_add(1, Ordering::SeqCst);
        // Run 0 is the warm-up; only real frames are gated.
        if run_idx > 0 {
            if let Some(gate) = &self.gate {
                let _ = gate.started.send(());
                if let Ok(release) = gate.release.lock() {
                    let _ = release.recv();
                }
            }
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_inference {
            return Err(DetectError::stage(Stage::Inference, "scripted backend fault"));
        }
        let cols = self.rows.first().map(|r| r.len()).unwrap_or(7);
        let flat: Vec<f32> = self.rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.rows.len(), cols), flat).map_err(DetectError::from)
    }
}

/// Loader producing [`StubEngine`] instances.
pub(crate) struct StubLoader {
    pub rows: Vec<Vec<f32>>,
    pub fail_load: bool,
    pub fail_inference: bool,
    pub param_bytes: usize,
    pub delay: Option<Duration>,
    pub loads: Arc<AtomicUsize>,
    pub runs: Arc<AtomicUsize>,
    pub gate: Mutex<Option<Arc<EngineGate>>>,
}

impl StubLoader {
    /// A loader whose engines emit the given raw rows.
    pub fn with_rows(rows: Vec<Vec<f32>>) -> Self {
        Self {
            rows,
            fail_load: false,
            fail_inference: false,
            param_bytes: 1_000,
            delay: None,
            loads: Arc::new(AtomicUsize::new(0)),
            runs: Arc::new(AtomicUsize::new(0)),
            gate: Mutex::new(None),
        }
    }

    /// A loader that fails every load attempt.
    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Self::with_rows(Vec::new())
        }
    }
}

impl EngineLoader for StubLoader {
    fn load(
        &self,
        spec: &ModelSpec,
        scope: &mut TensorScope,
    ) -> Result<Box<dyn InferenceEngine>, DetectError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(DetectError::model_load(
                &spec.reference,
                "scripted load failure",
            ));
        }
        scope.register("stub parameters", self.param_bytes);
        let gate = self
            .gate
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        Ok(Box::new(StubEngine {
            rows: self.rows.clone(),
            runs: Arc::clone(&self.runs),
            fail_inference: self.fail_inference,
            delay: self.delay,
            gate,
        }))
    }
}
