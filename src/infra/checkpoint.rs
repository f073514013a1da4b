// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (model_epoch_N.mpk, half precision) — all learned parameters
//   2. latest_epoch.json                 — which epoch was last saved
//   3. train_config.json                 — architecture + run settings
//
// The config is needed to rebuild a RamModel with the right
// widths, image size, glimpse size and step count before the
// weights can be loaded into it.
//
// The reward baseline is training state, not a model parameter,
// so it is not part of the record; it is logged per epoch in
// metrics.csv instead.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::RamModel;

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const CONFIG_FILE:       &str = "train_config.json";

/// Manages saving and loading of model checkpoints.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }


    fn model_path(&self, epoch: usize) -> PathBuf {
        // Without extension — the recorder adds it
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// Save model weights for a given epoch and move the
    /// latest-epoch pointer to it.
    pub fn save_model<B: Backend>(&self, model: &RamModel<B>, epoch: usize) -> Result<()> {
        let path = self.model_path(epoch);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        let latest_path = self.dir.join(LATEST_EPOCH_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_EPOCH_FILE}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load weights from the latest saved checkpoint into `model`.
    /// The model must have the architecture the checkpoint was saved with.
    pub fn load_model<B: Backend>(
        &self,
        model:  RamModel<B>,
        device: &B::Device,
    ) -> Result<RamModel<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.model_path(epoch);

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration from JSON.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'predict'.",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }

    /// Epoch number of the most recent checkpoint.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_EPOCH_FILE);

        let s = fs::read_to_string(&path)
            .with_context(|| {
                format!("Cannot find '{LATEST_EPOCH_FILE}'. Have you run 'train' first?")
            })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::domain::location::Location;
    use crate::ml::model::RamConfig;

    type TestBackend = NdArray;

    fn temp_dir(tag: &str) -> String {
        let dir = std::env::temp_dir().join(format!("ram-ckpt-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir.to_string_lossy().into_owned()
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = temp_dir("config");
        let ckpt = CheckpointManager::new(&dir);
        let cfg  = TrainConfig { n_step: 4, g_size: 6, ..TrainConfig::default() };

        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.n_step, 4);
        assert_eq!(loaded.g_size, 6);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir  = temp_dir("missing");
        let ckpt = CheckpointManager::new(&dir);
        assert!(ckpt.latest_epoch().is_err());
        assert!(ckpt.load_config().is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_weights_round_trip() {
        let dir    = temp_dir("weights");
        let ckpt   = CheckpointManager::new(&dir);
        let device = Default::default();
        let config = RamConfig::new().with_n_e(8).with_n_h(16).with_in_size(8).with_g_size(4).with_n_step(3);

        let trained: RamModel<TestBackend> = config.init(&device);
        ckpt.save_model(&trained, 1).unwrap();
        ckpt.save_model(&trained, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let fresh: RamModel<TestBackend> = config.init(&device);
        let restored = ckpt.load_model(fresh, &device).unwrap();

        // CompactRecorder stores half precision; compare with a tolerance
        let weights = |m: &RamModel<TestBackend>| -> Vec<f32> {
            m.fc_hl.weight.val().into_data().iter::<f32>().collect()
        };
        let (a, b) = (weights(&trained), weights(&restored));
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-2));

        let pred = restored
            .predict(Tensor::<TestBackend, 2>::ones([8, 8], &device), Location::CENTER)
            .unwrap();
        assert_eq!(pred.steps(), 3);

        let _ = fs::remove_dir_all(&dir);
    }
}
