//! Non-maximum suppression.
//!
//! Deduplicates overlapping candidates: candidates are sorted by score
//! descending and greedily selected; anything overlapping an already selected
//! candidate above the IoU threshold is dropped. Suppression is
//! class-agnostic: candidates of different classes suppress each other.
//!
//! Determinism: the sort is stable, so candidates with equal scores keep
//! their decode order. Given the same candidate set and threshold the output
//! is identical across runs.

use crate::processors::types::{BoundingBox, DetectionCandidate};
use std::cmp::Ordering;
use tracing::debug;

/// Intersection-over-union of two boxes.
///
/// Returns 0 when the boxes do not overlap or their union has zero area.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x_min = a.x_min.max(b.x_min);
    let y_min = a.y_min.max(b.y_min);
    let x_max = a.x_max.min(b.x_max);
    let y_max = a.y_max.min(b.y_max);

    let intersection = (x_max - x_min).max(0.0) * (y_max - y_min).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Class-agnostic greedy non-maximum suppression.
#[derive(Debug, Clone)]
pub struct SuppressionEngine {
    iou_threshold: f32,
}

impl SuppressionEngine {
    /// Creates a suppression engine with the given IoU threshold.
    pub fn new(iou_threshold: f32) -> Self {
        Self { iou_threshold }
    }

    /// The configured IoU threshold.
    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    /// Suppresses overlapping candidates, returning the survivors in
    /// descending score order.
    pub fn suppress(&self, mut candidates: Vec<DetectionCandidate>) -> Vec<DetectionCandidate> {
        if candidates.len() <= 1 {
            return candidates;
        }

        // Stable: equal scores keep their decode order.
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let before = candidates.len();
        let mut selected: Vec<DetectionCandidate> = Vec::new();
        for candidate in candidates {
            let overlaps = selected
                .iter()
                .any(|kept| iou(&kept.bbox, &candidate.bbox) > self.iou_threshold);
            if !overlaps {
                selected.push(candidate);
            }
        }

        debug!(
            before,
            after = selected.len(),
            "non-maximum suppression complete"
        );
        selected
    }
}
