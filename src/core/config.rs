//! Pipeline configuration.
//!
//! This module defines the configuration for a detection pipeline instance:
//! the default model reference, the model's fixed square input resolution,
//! the class vocabulary, and the decode/suppression thresholds. The
//! configuration is serde-compatible so hosts can ship it as JSON alongside
//! the `LoadModel` message.

use crate::core::errors::DetectError;
use serde::{Deserialize, Serialize};

fn default_input_side() -> u32 {
    640
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_iou_threshold() -> f32 {
    0.45
}

fn default_max_detections() -> usize {
    100
}

/// Configuration for a detection pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Default model reference (path or URI) used when `LoadModel` carries
    /// none.
    pub model_reference: String,
    /// Square input resolution of the model, in pixels.
    #[serde(default = "default_input_side")]
    pub input_side: u32,
    /// Ordered class vocabulary; index = class id.
    pub class_vocabulary: Vec<String>,
    /// Minimum score a candidate must reach to survive decoding.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// IoU above which a lower-scored candidate is suppressed.
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    /// Upper bound on detections emitted per frame.
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,
    /// Optional per-frame wall-clock budget in milliseconds. A cycle that
    /// overruns it reports an error instead of a result.
    #[serde(default)]
    pub frame_deadline_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_reference: String::new(),
            input_side: default_input_side(),
            class_vocabulary: Vec::new(),
            confidence_threshold: default_confidence_threshold(),
            iou_threshold: default_iou_threshold(),
            max_detections: default_max_detections(),
            frame_deadline_ms: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with the given model reference and vocabulary,
    /// keeping default thresholds.
    pub fn new(model_reference: impl Into<String>, class_vocabulary: Vec<String>) -> Self {
        Self {
            model_reference: model_reference.into(),
            class_vocabulary,
            ..Self::default()
        }
    }

    /// Sets the model's square input resolution.
    pub fn with_input_side(mut self, input_side: u32) -> Self {
        self.input_side = input_side;
        self
    }

    /// Sets the confidence threshold.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Sets the IoU suppression threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Sets the per-frame deadline in milliseconds.
    pub fn with_frame_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.frame_deadline_ms = Some(deadline_ms);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * `input_side` is zero
    /// * `class_vocabulary` is empty
    /// * either threshold is outside `[0, 1]` or not finite
    /// * `max_detections` is zero
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.input_side == 0 {
            return Err(DetectError::config("input_side must be greater than 0"));
        }
        if self.class_vocabulary.is_empty() {
            return Err(DetectError::config("class_vocabulary must not be empty"));
        }
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(DetectError::config(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !self.iou_threshold.is_finite() || !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetectError::config(format!(
                "iou_threshold must be in [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if self.max_detections == 0 {
            return Err(DetectError::config("max_detections must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> PipelineConfig {
        PipelineConfig::new("models/det.onnx", vec!["person".into(), "car".into()])
    }

    #[test]
    fn defaults_are_valid() {
        let config = base_config();
        assert_eq!(config.input_side, 640);
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.iou_threshold, 0.45);
        assert_eq!(config.max_detections, 100);
        assert!(config.frame_deadline_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_vocabulary() {
        let config = PipelineConfig::new("models/det.onnx", Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        assert!(base_config()
            .with_confidence_threshold(1.5)
            .validate()
            .is_err());
        assert!(base_config().with_iou_threshold(-0.1).validate().is_err());
        assert!(base_config()
            .with_confidence_threshold(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn rejects_zero_input_side() {
        assert!(base_config().with_input_side(0).validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"model_reference": "m.onnx", "class_vocabulary": ["person"]}"#,
        )
        .unwrap();
        assert_eq!(config.input_side, 640);
        assert_eq!(config.iou_threshold, 0.45);
        assert!(config.validate().is_ok());
    }
}
