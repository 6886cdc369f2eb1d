//! Messaging protocol between host and worker.
//!
//! Messages are tagged unions handled by exhaustive pattern matching, so a
//! new message kind cannot be silently ignored. For hosts that speak JSON,
//! [`parse_host_message`] maps unknown or malformed `type` tags to a
//! protocol error instead of dropping them.

use crate::core::errors::DetectError;
use crate::processors::types::{DetectionCandidate, Frame};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Messages the host sends to the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    /// Load (or hot-swap to) a model. Without a reference, the last
    /// configured one is reused.
    LoadModel {
        /// Optional model reference overriding the configured default.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_reference: Option<String>,
    },
    /// Run the pipeline over one frame.
    ProcessFrame {
        /// The frame to process.
        frame: Frame,
    },
    /// Tear the worker down, releasing every tracked buffer.
    Shutdown,
}

/// Events the worker emits to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerEvent {
    /// A load attempt completed.
    ModelLoaded {
        /// Whether the model reached the `Ready` state.
        success: bool,
        /// Failure description when `success` is false.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Decode and suppression completed for a frame.
    DetectionResult(DetectionResult),
    /// A stage failed without crashing the worker.
    Error {
        /// Description of the failure.
        message: String,
    },
}

/// Object-detection payload of a [`DetectionResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionPayload {
    /// Payload discriminator; always `"object"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Boxes as `[x_min, y_min, x_max, y_max]`, normalized to the model's
    /// square input resolution.
    pub boxes: Vec<[f32; 4]>,
    /// Class labels, parallel to `boxes`.
    pub classes: Vec<String>,
    /// Scores, parallel to `boxes`.
    pub scores: Vec<f32>,
}

/// The per-frame result exposed to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionResult {
    /// Result modality; always `"vision"`.
    pub modality: String,
    /// The detections.
    pub payload: DetectionPayload,
    /// Highest score among the detections; 0 when there are none.
    pub confidence: f32,
    /// Capture timestamp of the frame, in milliseconds.
    pub timestamp: u64,
}

impl DetectionResult {
    /// Builds a result from suppressed candidates and the model vocabulary.
    ///
    /// Candidates whose class id falls outside the vocabulary are dropped
    /// with a warning; the decoder cannot produce them unless the model's
    /// output width disagrees with the configured vocabulary.
    pub fn from_candidates(
        candidates: &[DetectionCandidate],
        vocabulary: &[String],
        timestamp_ms: u64,
    ) -> Self {
        let mut boxes = Vec::with_capacity(candidates.len());
        let mut classes = Vec::with_capacity(candidates.len());
        let mut scores = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let Some(label) = vocabulary.get(candidate.class_id) else {
                warn!(
                    class_id = candidate.class_id,
                    vocabulary = vocabulary.len(),
                    "dropping candidate with out-of-vocabulary class"
                );
                continue;
            };
            boxes.push(candidate.bbox.to_array());
            classes.push(label.clone());
            scores.push(candidate.score);
        }

        let confidence = scores.iter().copied().fold(0.0f32, f32::max);

        Self {
            modality: "vision".to_string(),
            payload: DetectionPayload {
                kind: "object".to_string(),
                boxes,
                classes,
                scores,
            },
            confidence,
            timestamp: timestamp_ms,
        }
    }

    /// Number of detections in the result.
    pub fn len(&self) -> usize {
        self.payload.boxes.len()
    }

    /// Whether the result contains no detections.
    pub fn is_empty(&self) -> bool {
        self.payload.boxes.is_empty()
    }
}

/// Parses a JSON host message, mapping unknown or malformed `type` tags to a
/// protocol error.
pub fn parse_host_message(json: &str) -> Result<HostMessage, DetectError> {
    serde_json::from_str(json).map_err(|e| DetectError::protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::types::BoundingBox;

    fn candidate(score: f32, class_id: usize) -> DetectionCandidate {
        DetectionCandidate {
            bbox: BoundingBox::new(0.1, 0.1, 0.3, 0.3),
            class_id,
            score,
        }
    }

    #[test]
    fn result_wire_shape_matches_contract() {
        let vocabulary = vec!["person".to_string(), "car".to_string()];
        let result = DetectionResult::from_candidates(&[candidate(0.95, 0)], &vocabulary, 1234);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["modality"], "vision");
        assert_eq!(value["payload"]["type"], "object");
        assert_eq!(value["payload"]["classes"], serde_json::json!(["person"]));
        assert_eq!(value["timestamp"], 1234);

        let boxes = value["payload"]["boxes"].as_array().unwrap();
        assert_eq!(boxes.len(), 1);
        let corners = boxes[0].as_array().unwrap();
        for (corner, want) in corners.iter().zip([0.1, 0.1, 0.3, 0.3]) {
            assert!((corner.as_f64().unwrap() - want).abs() < 1e-6);
        }
        assert!((value["confidence"].as_f64().unwrap() - 0.95).abs() < 1e-6);
        let scores = value["payload"]["scores"].as_array().unwrap();
        assert!((scores[0].as_f64().unwrap() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn empty_result_has_zero_confidence() {
        let result = DetectionResult::from_candidates(&[], &["person".to_string()], 5);
        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn out_of_vocabulary_candidates_are_dropped() {
        let vocabulary = vec!["person".to_string()];
        let result =
            DetectionResult::from_candidates(&[candidate(0.9, 0), candidate(0.8, 7)], &vocabulary, 0);
        assert_eq!(result.len(), 1);
        assert_eq!(result.payload.classes, vec!["person".to_string()]);
    }

    #[test]
    fn parses_load_model_with_and_without_reference() {
        let msg = parse_host_message(r#"{"type": "LoadModel"}"#).unwrap();
        assert!(matches!(msg, HostMessage::LoadModel { model_reference: None }));

        let msg =
            parse_host_message(r#"{"type": "LoadModel", "model_reference": "m.onnx"}"#).unwrap();
        match msg {
            HostMessage::LoadModel { model_reference } => {
                assert_eq!(model_reference.as_deref(), Some("m.onnx"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_a_protocol_error() {
        let err = parse_host_message(r#"{"type": "SelfDestruct"}"#).unwrap_err();
        assert!(matches!(err, DetectError::Protocol { .. }));
    }

    #[test]
    fn model_loaded_omits_error_on_success() {
        let event = WorkerEvent::ModelLoaded {
            success: true,
            error: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("error"));
    }
}
