//! The detection pipeline: session, worker, and host protocol.
//!
//! # Modules
//!
//! * `protocol` - Tagged host/worker messages and the result wire shape
//! * `session` - Model lifecycle and the per-frame processing cycle
//! * `worker` - The dedicated worker thread and its message loop

pub mod protocol;
pub mod session;
pub mod worker;

#[cfg(test)]
pub(crate) mod testkit;

pub use protocol::{
    parse_host_message, DetectionPayload, DetectionResult, HostMessage, WorkerEvent,
};
pub use session::{ModelState, PipelineSession};
pub use worker::PipelineWorker;
