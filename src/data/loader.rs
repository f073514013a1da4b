// ============================================================
// Layer 4 — MNIST Loader
// ============================================================
// Loads MNIST through burn's vision dataset. The first call
// downloads the IDX files into burn's cache directory; later
// calls read from the cache.
//
// Each MnistItem carries a 28x28 array of 0..=255 intensities
// and a u8 label. We flatten the array row-major and send it
// through the Normalizer so the rest of the pipeline only ever
// sees ImageSample values in [0, 1].

use anyhow::{Context, Result};
use burn::data::dataset::{
    vision::{MnistDataset, MnistItem},
    Dataset,
};

use crate::data::dataset::ImageSample;
use crate::data::preprocessor::Normalizer;
use crate::domain::traits::ImageSource;

/// MNIST digits are always 28x28.
pub const MNIST_SIZE: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnistSplit {
    Train,
    Test,
}

/// Loads one MNIST split. Implements the ImageSource trait from Layer 3.
pub struct MnistSource {
    split:      MnistSplit,
    normalizer: Normalizer,
}

impl MnistSource {
    pub fn new(split: MnistSplit) -> Self {
        Self { split, normalizer: Normalizer::eight_bit(MNIST_SIZE) }
    }

    fn open(&self) -> MnistDataset {
        tracing::debug!("Opening MNIST {:?} split", self.split);
        match self.split {
            MnistSplit::Train => MnistDataset::train(),
            MnistSplit::Test  => MnistDataset::test(),
        }
    }

    fn convert(&self, item: MnistItem) -> Result<ImageSample> {
        let raw: Vec<f32> = item.image.iter().flatten().copied().collect();
        self.normalizer.normalize(raw, item.label as usize)
    }
}

impl ImageSource for MnistSource {
    fn image_size(&self) -> usize {
        MNIST_SIZE
    }

    fn load_all(&self) -> Result<Vec<ImageSample>> {
        let samples = self
            .open()
            .iter()
            .map(|item| self.convert(item))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Loaded {} MNIST {:?} images", samples.len(), self.split);
        Ok(samples)
    }

    fn load_at(&self, index: usize) -> Result<ImageSample> {
        let dataset = self.open();
        let len     = dataset.len();
        let item = dataset
            .get(index)
            .with_context(|| format!("MNIST {:?} index {} out of range (len {})", self.split, index, len))?;
        self.convert(item)
    }
}
