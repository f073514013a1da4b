use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One labelled square image, flattened row-major.
/// Pixel values are already normalised into [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSample {
    pub pixels: Vec<f32>,
    pub label:  usize,
}

impl ImageSample {
    pub fn new(pixels: Vec<f32>, label: usize) -> Self {
        Self { pixels, label }
    }

    /// An all-zero image, handy for inspecting the untrained policy.
    pub fn blank(in_size: usize) -> Self {
        Self { pixels: vec![0.0; in_size * in_size], label: 0 }
    }
}

pub struct ImageDataset {
    samples: Vec<ImageSample>,
}

impl ImageDataset {
    pub fn new(samples: Vec<ImageSample>) -> Self { Self { samples } }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
