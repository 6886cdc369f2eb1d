//! Type definitions shared across the processing stages.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in normalized `[0, 1]` coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Left edge.
    pub x_min: f32,
    /// Top edge.
    pub y_min: f32,
    /// Right edge.
    pub x_max: f32,
    /// Bottom edge.
    pub y_max: f32,
}

impl BoundingBox {
    /// Creates a bounding box from corner coordinates.
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Creates a bounding box from a center point and size.
    pub fn from_center_size(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x_min: cx - w / 2.0,
            y_min: cy - h / 2.0,
            x_max: cx + w / 2.0,
            y_max: cy + h / 2.0,
        }
    }

    /// Area of the box; zero for degenerate boxes.
    pub fn area(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0) * (self.y_max - self.y_min).max(0.0)
    }

    /// Whether the corners are ordered (`x_min <= x_max`, `y_min <= y_max`).
    pub fn is_ordered(&self) -> bool {
        self.x_min <= self.x_max && self.y_min <= self.y_max
    }

    /// The box as `[x_min, y_min, x_max, y_max]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

/// A raw video frame, consumed entirely within one processing cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Tightly packed RGB8 pixels, row-major.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Capture timestamp in milliseconds.
    pub timestamp_ms: u64,
}

impl Frame {
    /// Creates a frame from raw RGB8 pixels.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, timestamp_ms: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp_ms,
        }
    }
}

/// A decoded detection that survived the confidence threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionCandidate {
    /// Location of the detection, normalized.
    pub bbox: BoundingBox,
    /// Index into the model's class vocabulary.
    pub class_id: usize,
    /// `objectness x max(class_scores)`.
    pub score: f32,
}
