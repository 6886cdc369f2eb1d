//! Detection decoding.
//!
//! Turns raw model output into candidate boxes and scores. Each output row is
//! `[cx, cy, w, h, objectness, class_0, ..., class_{C-1}]` in normalized
//! coordinates. A row's score is `objectness x max(class_scores)`; rows below
//! the confidence threshold are discarded before suppression. Output order is
//! unspecified; the suppression stage re-sorts by score.

use crate::core::RawOutput;
use crate::processors::types::{BoundingBox, DetectionCandidate};
use tracing::debug;

/// Columns preceding the per-class scores in a raw detection row.
const ROW_PREFIX: usize = 5;

/// Decodes raw model output rows into confidence-filtered candidates.
#[derive(Debug, Clone)]
pub struct DetectionDecoder {
    confidence_threshold: f32,
}

impl DetectionDecoder {
    /// Creates a decoder with the given confidence threshold.
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// The configured confidence threshold.
    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Decodes every row of `raw` into candidates, dropping rows below the
    /// confidence threshold. Rows that are too short or contain non-finite
    /// values are skipped and counted.
    pub fn decode(&self, raw: &RawOutput) -> Vec<DetectionCandidate> {
        let mut candidates = Vec::new();
        let mut skipped = 0usize;

        for row in raw.rows() {
            let Some(row) = row.as_slice() else {
                skipped += 1;
                continue;
            };
            if row.len() <= ROW_PREFIX || row.iter().any(|v| !v.is_finite()) {
                skipped += 1;
                continue;
            }

            let objectness = row[4];
            let (class_id, class_score) = row[ROW_PREFIX..].iter().enumerate().fold(
                (0usize, f32::MIN),
                |(best_cls, best_score), (cls_idx, &score)| {
                    if score > best_score {
                        (cls_idx, score)
                    } else {
                        (best_cls, best_score)
                    }
                },
            );

            let score = objectness * class_score;
            if score < self.confidence_threshold {
                continue;
            }

            candidates.push(DetectionCandidate {
                bbox: BoundingBox::from_center_size(row[0], row[1], row[2], row[3]),
                class_id,
                score,
            });
        }

        if skipped > 0 {
            debug!(skipped, "skipped malformed detection rows");
        }
        debug!(candidates = candidates.len(), "decoded raw output");
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn raw(rows: Vec<Vec<f32>>) -> RawOutput {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((rows.len(), cols), flat).unwrap()
    }

    #[test]
    fn scores_are_objectness_times_best_class() {
        let decoder = DetectionDecoder::new(0.5);
        let out = decoder.decode(&raw(vec![vec![0.2, 0.2, 0.2, 0.2, 0.9, 0.3, 0.8]]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 1);
        assert!((out[0].score - 0.72).abs() < 1e-6);
    }

    #[test]
    fn rows_below_threshold_are_discarded() {
        let decoder = DetectionDecoder::new(0.5);
        let out = decoder.decode(&raw(vec![
            vec![0.2, 0.2, 0.2, 0.2, 0.9, 1.0, 0.0],
            vec![0.5, 0.5, 0.1, 0.1, 0.4, 0.9, 0.0],
        ]));
        assert_eq!(out.len(), 1);
        assert!(out.iter().all(|c| c.score >= 0.5));
    }

    #[test]
    fn surviving_boxes_are_ordered() {
        let decoder = DetectionDecoder::new(0.1);
        let out = decoder.decode(&raw(vec![
            vec![0.2, 0.2, 0.2, 0.2, 0.9, 1.0],
            vec![0.8, 0.8, 0.3, 0.3, 0.8, 1.0],
        ]));
        assert_eq!(out.len(), 2);
        for candidate in &out {
            assert!(candidate.bbox.is_ordered());
        }
    }

    #[test]
    fn center_size_converts_to_corners() {
        let decoder = DetectionDecoder::new(0.5);
        let out = decoder.decode(&raw(vec![vec![0.2, 0.2, 0.2, 0.2, 0.95, 1.0, 0.0]]));
        let bbox = out[0].bbox;
        assert!((bbox.x_min - 0.1).abs() < 1e-6);
        assert!((bbox.y_min - 0.1).abs() < 1e-6);
        assert!((bbox.x_max - 0.3).abs() < 1e-6);
        assert!((bbox.y_max - 0.3).abs() < 1e-6);
    }

    #[test]
    fn non_finite_rows_are_skipped() {
        let decoder = DetectionDecoder::new(0.1);
        let out = decoder.decode(&raw(vec![
            vec![0.2, 0.2, f32::NAN, 0.2, 0.9, 1.0],
            vec![0.2, 0.2, 0.2, 0.2, 0.9, 1.0],
        ]));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn rows_without_class_scores_are_skipped() {
        let decoder = DetectionDecoder::new(0.0);
        let out = decoder.decode(&raw(vec![vec![0.2, 0.2, 0.2, 0.2, 0.9]]));
        assert!(out.is_empty());
    }

    #[test]
    fn empty_output_decodes_to_nothing() {
        let decoder = DetectionDecoder::new(0.5);
        let raw = Array2::zeros((0, 7));
        assert!(decoder.decode(&raw).is_empty());
    }
}
