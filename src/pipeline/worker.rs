//! The detection worker.
//!
//! A dedicated thread owns a [`PipelineSession`] and processes host messages
//! one at a time off an mpsc channel, so frame handling is fully serialized:
//! a second frame can never interleave with one that is still inferring, and
//! results are emitted in dispatch order.
//!
//! Backpressure policy (latest wins): before starting a cycle the worker
//! drains its mailbox and keeps only the newest pending frame; superseded
//! frames are counted and logged. Non-frame messages pulled during the drain
//! are re-queued and handled in arrival order after the cycle. Frames that
//! arrive before a model is `Ready` are dropped with an observable `Error`
//! event.

use crate::core::config::PipelineConfig;
use crate::core::errors::DetectError;
use crate::core::inference::{EngineLoader, OrtEngineLoader};
use crate::pipeline::protocol::{HostMessage, WorkerEvent};
use crate::pipeline::session::PipelineSession;
use crate::processors::types::Frame;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

/// Handle to a running detection worker.
///
/// Dropping the handle sends `Shutdown` and joins the thread, releasing every
/// tracked buffer.
pub struct PipelineWorker {
    tx: Sender<HostMessage>,
    thread: Option<JoinHandle<()>>,
}

impl PipelineWorker {
    /// Spawns a worker with a custom engine loader.
    ///
    /// Returns the handle and the event stream. Configuration is validated
    /// before the thread starts.
    pub fn spawn(
        config: PipelineConfig,
        loader: Box<dyn EngineLoader>,
    ) -> Result<(Self, Receiver<WorkerEvent>), DetectError> {
        config.validate()?;
        let (tx, rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("rt-detect-worker".to_string())
            .spawn(move || worker_loop(config, loader, rx, event_tx))?;
        Ok((
            Self {
                tx,
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    /// Spawns a worker backed by ONNX Runtime.
    pub fn spawn_with_ort(
        config: PipelineConfig,
    ) -> Result<(Self, Receiver<WorkerEvent>), DetectError> {
        Self::spawn(config, Box::new(OrtEngineLoader))
    }

    /// Sends a message to the worker.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the worker thread has already exited.
    pub fn send(&self, message: HostMessage) -> Result<(), DetectError> {
        self.tx
            .send(message)
            .map_err(|_| DetectError::protocol("worker is no longer running"))
    }

    /// Shuts the worker down and waits for it to exit.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(HostMessage::Shutdown);
            if thread.join().is_err() {
                error!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

fn worker_loop(
    config: PipelineConfig,
    loader: Box<dyn EngineLoader>,
    rx: Receiver<HostMessage>,
    events: Sender<WorkerEvent>,
) {
    let mut session = match PipelineSession::new(config, loader) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "failed to construct pipeline session");
            let _ = events.send(WorkerEvent::Error {
                message: e.to_string(),
            });
            return;
        }
    };

    let mut queue: VecDeque<HostMessage> = VecDeque::new();
    loop {
        let message = match queue.pop_front() {
            Some(message) => message,
            None => match rx.recv() {
                Ok(message) => message,
                // Host dropped its sender: tear down.
                Err(_) => break,
            },
        };

        match message {
            HostMessage::Shutdown => {
                debug!("shutdown requested");
                break;
            }
            HostMessage::LoadModel { model_reference } => {
                let event = match session.load(model_reference.as_deref()) {
                    Ok(()) => WorkerEvent::ModelLoaded {
                        success: true,
                        error: None,
                    },
                    Err(e) => {
                        error!(error = %e, "model load failed");
                        WorkerEvent::ModelLoaded {
                            success: false,
                            error: Some(e.to_string()),
                        }
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            HostMessage::ProcessFrame { frame } => {
                let frame = drain_to_latest(&rx, &mut queue, frame);
                let event = match session.process_frame(frame) {
                    Ok(result) => WorkerEvent::DetectionResult(result),
                    Err(e) => {
                        warn!(error = %e, "frame cycle failed");
                        WorkerEvent::Error {
                            message: e.to_string(),
                        }
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        }
    }
    debug!("worker loop exited");
}

/// Single-slot mailbox: collapse every already-queued frame into the newest
/// one. A non-frame message ends the drain and is re-queued for in-order
/// handling.
fn drain_to_latest(
    rx: &Receiver<HostMessage>,
    queue: &mut VecDeque<HostMessage>,
    mut frame: Frame,
) -> Frame {
    let mut superseded = 0usize;
    while let Ok(next) = rx.try_recv() {
        match next {
            HostMessage::ProcessFrame { frame: newer } => {
                superseded += 1;
                frame = newer;
            }
            other => {
                queue.push_back(other);
                break;
            }
        }
    }
    if superseded > 0 {
        debug!(superseded, "superseded queued frames (latest wins)");
    }
    frame
}
