//! Frame preprocessing.
//!
//! Converts an incoming raw frame into the model's input tensor: validate the
//! payload against the declared dimensions, decode into an RGB image,
//! bilinear-resize to the model's square input resolution, scale 0-255 pixel
//! values into `[0, 1]` floats, and add the leading batch dimension. Every
//! intermediate buffer is registered with the cycle's tensor scope so it is
//! released when the cycle ends.

use crate::core::errors::{DetectError, Stage};
use crate::core::resources::TensorScope;
use crate::core::Tensor4D;
use crate::processors::types::Frame;
use image::imageops::FilterType;
use image::RgbImage;
use tracing::debug;

/// Converts raw frames into normalized `[1, side, side, 3]` input tensors.
#[derive(Debug, Clone)]
pub struct FramePreprocessor {
    input_side: u32,
}

impl FramePreprocessor {
    /// Creates a preprocessor for the given square input resolution.
    pub fn new(input_side: u32) -> Self {
        Self { input_side }
    }

    /// The square input resolution this preprocessor produces.
    pub fn input_side(&self) -> u32 {
        self.input_side
    }

    /// Preprocesses one frame into the model input tensor.
    ///
    /// The frame is consumed; its pixel buffer and every intermediate tensor
    /// are registered with `scope` and released when the scope drops.
    ///
    /// # Errors
    ///
    /// Returns a preprocess error if the frame's declared dimensions do not
    /// match its payload size or the pixel buffer cannot be decoded.
    pub fn preprocess(&self, frame: Frame, scope: &mut TensorScope) -> Result<Tensor4D, DetectError> {
        let expected = frame.width as usize * frame.height as usize * 3;
        if frame.pixels.len() != expected {
            return Err(DetectError::FramePayload {
                width: frame.width,
                height: frame.height,
                expected,
                actual: frame.pixels.len(),
            });
        }
        if expected == 0 {
            return Err(DetectError::stage(Stage::Preprocess, "empty frame"));
        }

        let (width, height) = (frame.width, frame.height);
        scope.register("frame pixels", frame.pixels.len());
        let image = RgbImage::from_raw(width, height, frame.pixels).ok_or_else(|| {
            DetectError::stage(
                Stage::Preprocess,
                format!("failed to decode {width}x{height} RGB frame"),
            )
        })?;

        let side = self.input_side;
        let resized = if (width, height) == (side, side) {
            image
        } else {
            let resized = image::imageops::resize(&image, side, side, FilterType::Triangle);
            scope.register("resized frame", resized.len());
            resized
        };

        let scaled: Vec<f32> = resized
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect();
        scope.register("input tensor", scaled.len() * std::mem::size_of::<f32>());
        let tensor =
            Tensor4D::from_shape_vec((1, side as usize, side as usize, 3), scaled)?;

        debug!(
            width,
            height,
            side,
            "frame preprocessed"
        );
        Ok(tensor)
    }
}
