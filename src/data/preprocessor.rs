// ============================================================
// Layer 4 — Pixel Normaliser
// ============================================================
// Raw MNIST intensities arrive as 0..=255. The glimpse encoder
// works best on [0, 1] inputs, so every sample passes through
// here before it reaches a dataset:
//
//   1. Check the pixel count matches in_size * in_size
//   2. Multiply by the scale (1/255 for 8-bit images)
//   3. Clamp into [0, 1] in case the source was already scaled
//      or carries out-of-range values

use anyhow::{ensure, Result};

use crate::data::dataset::ImageSample;

pub const EIGHT_BIT_SCALE: f32 = 1.0 / 255.0;

#[derive(Debug, Clone)]
pub struct Normalizer {
    in_size: usize,
    scale:   f32,
}

impl Normalizer {
    pub fn new(in_size: usize, scale: f32) -> Self {
        Self { in_size, scale }
    }

    /// Normaliser for 8-bit grayscale images.
    pub fn eight_bit(in_size: usize) -> Self {
        Self::new(in_size, EIGHT_BIT_SCALE)
    }

    pub fn normalize(&self, raw: Vec<f32>, label: usize) -> Result<ImageSample> {
        let expected = self.in_size * self.in_size;
        ensure!(
            raw.len() == expected,
            "image has {} pixels, expected {} ({}x{})",
            raw.len(), expected, self.in_size, self.in_size
        );

        let pixels = raw
            .into_iter()
            .map(|p| (p * self.scale).clamp(0.0, 1.0))
            .collect();

        Ok(ImageSample::new(pixels, label))
    }
}
