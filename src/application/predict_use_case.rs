// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Runs one image through a trained checkpoint:
//   1. Load the saved TrainConfig (architecture + backend)
//   2. Pick the image: a test-set sample by index, or a blank one
//   3. Rebuild the model on the saved backend and predict
//   4. Attach pixel centers so the trajectory can be drawn

use anyhow::{ensure, Result};
use serde::Serialize;

use crate::data::{
    dataset::ImageSample,
    loader::{MnistSource, MnistSplit},
};
use crate::domain::{
    location::{Location, PixelCenter},
    prediction::Prediction,
    traits::ImageSource,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    device::{BackendKind, CpuBackend, GpuBackend},
    inferencer::Inferencer,
};

/// Which image to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageChoice {
    /// Sample at this position in the image source
    Index(usize),
    /// All-zero image of the model's input size
    Blank,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictOutcome {
    pub prediction: Prediction,
    /// Ground truth, when the image came from a labelled source
    pub true_label: Option<usize>,
    pub pixel_path: Vec<PixelCenter>,
}

impl PredictOutcome {
    pub fn is_correct(&self) -> Option<bool> {
        self.true_label.map(|label| label == self.prediction.label)
    }
}

pub struct PredictUseCase {
    ckpt_manager: CheckpointManager,
    source:       Box<dyn ImageSource>,
}

impl PredictUseCase {
    /// Predict on MNIST test images.
    pub fn new(checkpoint_dir: impl Into<String>) -> Self {
        Self::with_source(checkpoint_dir, Box::new(MnistSource::new(MnistSplit::Test)))
    }

    pub fn with_source(checkpoint_dir: impl Into<String>, source: Box<dyn ImageSource>) -> Self {
        Self { ckpt_manager: CheckpointManager::new(checkpoint_dir), source }
    }

    pub fn execute(&self, choice: ImageChoice, init_l: Location) -> Result<PredictOutcome> {
        ensure!(
            init_l.is_within_bounds(),
            "initial location ({}, {}) must lie in [-1, 1]",
            init_l.row, init_l.col
        );

        let cfg = self.ckpt_manager.load_config()?;

        let (sample, true_label) = match choice {
            ImageChoice::Blank => (ImageSample::blank(cfg.in_size), None),
            ImageChoice::Index(index) => {
                let sample = self.source.load_at(index)?;
                let label  = sample.label;
                (sample, Some(label))
            }
        };

        let (prediction, geometry) = match cfg.backend {
            BackendKind::NdArray => {
                let inferencer =
                    Inferencer::<CpuBackend>::from_checkpoint(&self.ckpt_manager, Default::default())?;
                (inferencer.predict(&sample, init_l)?, inferencer.geometry())
            }
            BackendKind::Wgpu => {
                let device = burn::backend::wgpu::WgpuDevice::default();
                let inferencer =
                    Inferencer::<GpuBackend>::from_checkpoint(&self.ckpt_manager, device)?;
                (inferencer.predict(&sample, init_l)?, inferencer.geometry())
            }
        };

        let pixel_path = prediction.pixel_path(&geometry);
        Ok(PredictOutcome { prediction, true_label, pixel_path })
    }
}
