// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds a RamModel from a checkpoint directory and runs the
// predict call on single images. No autodiff, no sampling: the
// model follows its own proposals from the given start location.

use anyhow::Result;
use burn::prelude::*;

use crate::data::{batcher::GlimpseBatcher, dataset::ImageSample};
use crate::domain::{
    location::{GlimpseGeometry, Location},
    prediction::Prediction,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::RamModel;

pub struct Inferencer<B: Backend> {
    model:   RamModel<B>,
    batcher: GlimpseBatcher,
    device:  B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: RamModel<B>, device: B::Device) -> Self {
        let batcher = GlimpseBatcher::new(model.in_size);
        Self { model, batcher, device }
    }

    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg   = ckpt_manager.load_config()?;
        let model = cfg.model_config().init::<B>(&device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!(
            "Model loaded from checkpoint ({} steps, {}x{} glimpses)",
            model.n_step, model.g_size, model.g_size
        );
        Ok(Self::new(model, device))
    }

    pub fn geometry(&self) -> GlimpseGeometry {
        self.model.geometry()
    }

    pub fn predict(&self, sample: &ImageSample, init_l: Location) -> Result<Prediction> {
        anyhow::ensure!(
            sample.pixels.len() == self.model.in_size * self.model.in_size,
            "image has {} pixels, model expects {}x{}",
            sample.pixels.len(), self.model.in_size, self.model.in_size
        );
        let image = self.batcher.image::<B>(sample, &self.device);
        let prediction = self.model.predict(image, init_l)?;

        let last = prediction.trajectory.last().copied().unwrap_or(Location::CENTER);
        tracing::debug!(
            "Predicted {} after {} glimpses, last at ({:.3}, {:.3})",
            prediction.label,
            prediction.steps(),
            last.row,
            last.col,
        );
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::ml::model::RamConfig;

    type TestBackend = NdArray;

    #[test]
    fn test_predict_from_sample() {
        let device = Default::default();
        let model: RamModel<TestBackend> = RamConfig::new()
            .with_n_e(8).with_n_h(16).with_in_size(10).with_g_size(4).with_n_step(5)
            .init(&device);
        let inferencer = Inferencer::new(model, device);

        let pred = inferencer.predict(&ImageSample::blank(10), Location::CENTER).unwrap();
        assert_eq!(pred.steps(), 5);
        assert!(pred.trajectory.iter().all(|l| l.is_within_bounds()));

        let path = pred.pixel_path(&inferencer.geometry());
        assert!(path.iter().all(|&c| inferencer.geometry().contains_crop(c)));
    }

    #[test]
    fn test_predict_rejects_wrong_size() {
        let device = Default::default();
        let model: RamModel<TestBackend> = RamConfig::new()
            .with_n_e(8).with_n_h(16).with_in_size(10).with_g_size(4).with_n_step(2)
            .init(&device);
        let inferencer = Inferencer::new(model, device);
        assert!(inferencer.predict(&ImageSample::blank(9), Location::CENTER).is_err());
    }
}
