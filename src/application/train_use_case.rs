// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load labelled images       (Layer 4 - data)
//   Step 2: Optionally cap the count   (Layer 4 - data)
//   Step 3: Split train/validation     (Layer 4 - data)
//   Step 4: Build datasets             (Layer 4 - data)
//   Step 5: Save config                (Layer 6 - infra)
//   Step 6: Run training loop          (Layer 5 - ml)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::ImageDataset,
    loader::{MnistSource, MnistSplit},
    splitter::split_train_val,
};
use crate::domain::traits::ImageSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{device::BackendKind, model::RamConfig, policy::LOC_VARIANCE, trainer::run_training};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Saved next to the checkpoints
// so `predict` can rebuild the exact same architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub checkpoint_dir: String,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub seed:           u64,
    pub val_fraction:   f64,
    pub limit:          Option<usize>,
    pub n_e:            usize,
    pub n_h:            usize,
    pub in_size:        usize,
    pub g_size:         usize,
    pub n_step:         usize,
    pub backend:        BackendKind,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: "checkpoints".to_string(),
            batch_size:     100,
            epochs:         10,
            lr:             1e-3,
            seed:           42,
            val_fraction:   0.1,
            limit:          None,
            n_e:            128,
            n_h:            256,
            in_size:        28,
            g_size:         8,
            n_step:         6,
            backend:        BackendKind::NdArray,
        }
    }
}

impl TrainConfig {
    /// Architecture part of the config, as Burn's model config.
    pub fn model_config(&self) -> RamConfig {
        RamConfig::new()
            .with_n_e(self.n_e)
            .with_n_h(self.n_h)
            .with_in_size(self.in_size)
            .with_g_size(self.g_size)
            .with_n_step(self.n_step)
            .with_loc_variance(LOC_VARIANCE)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch size must be positive");
        ensure!(self.epochs > 0, "need at least one epoch");
        ensure!(self.n_step >= 1, "n_step must be at least 1");
        ensure!(
            self.g_size >= 1 && self.g_size <= self.in_size,
            "glimpse size {} must be between 1 and the image size {}",
            self.g_size, self.in_size
        );
        ensure!(
            self.val_fraction > 0.0 && self.val_fraction < 1.0,
            "validation fraction must be in (0, 1), got {}", self.val_fraction
        );
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
    source: Box<dyn ImageSource>,
}

impl TrainUseCase {
    /// Train on the MNIST training split.
    pub fn new(config: TrainConfig) -> Self {
        Self::with_source(config, Box::new(MnistSource::new(MnistSplit::Train)))
    }

    pub fn with_source(config: TrainConfig, source: Box<dyn ImageSource>) -> Self {
        Self { config, source }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        // The source decides the image size, not the flags
        let cfg = TrainConfig { in_size: self.source.image_size(), ..self.config.clone() };
        cfg.validate()?;

        // ── Step 1: Load images ───────────────────────────────────────────────
        let mut samples = self.source.load_all()?;
        ensure!(!samples.is_empty(), "image source returned no samples");

        // ── Step 2: Cap the sample count for quick runs ───────────────────────
        if let Some(limit) = cfg.limit {
            samples.truncate(limit);
            tracing::info!("Limiting training data to {} images", samples.len());
        }

        // ── Step 3: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) =
            split_train_val(samples, 1.0 - cfg.val_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );
        ensure!(!train_samples.is_empty(), "no training samples left after the split");
        ensure!(
            !val_samples.is_empty(),
            "validation fraction {} leaves no validation images out of {}",
            cfg.val_fraction, train_samples.len()
        );

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        let train_dataset = ImageDataset::new(train_samples);
        let val_dataset   = ImageDataset::new(val_samples);

        // ── Step 5: Save config for inference ─────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(&cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(&cfg, train_dataset, val_dataset, &ckpt_manager, &metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ImageSample;

    /// Eight-pixel-wide synthetic digits: class k lights up row k.
    pub(crate) struct StripeSource;

    impl ImageSource for StripeSource {
        fn image_size(&self) -> usize { 8 }

        fn load_all(&self) -> Result<Vec<ImageSample>> {
            Ok((0..20)
                .map(|i| {
                    let label = i % 4;
                    let mut pixels = vec![0.0; 64];
                    pixels[label * 8..label * 8 + 8].fill(1.0);
                    ImageSample::new(pixels, label)
                })
                .collect())
        }
    }

    fn temp_dir(tag: &str) -> String {
        let dir = std::env::temp_dir().join(format!("ram-usecase-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.to_string_lossy().into_owned()
    }

    fn tiny_config(dir: &str) -> TrainConfig {
        TrainConfig {
            checkpoint_dir: dir.to_string(),
            batch_size: 4,
            epochs:     1,
            val_fraction: 0.2,
            n_e:        8,
            n_h:        16,
            in_size:    28, // overridden by the source
            g_size:     4,
            n_step:     3,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(TrainConfig::default().validate().is_ok());
        assert!(TrainConfig { g_size: 40, ..TrainConfig::default() }.validate().is_err());
        assert!(TrainConfig { batch_size: 0, ..TrainConfig::default() }.validate().is_err());
        assert!(TrainConfig { val_fraction: 1.0, ..TrainConfig::default() }.validate().is_err());
        assert!(TrainConfig { val_fraction: 0.0, ..TrainConfig::default() }.validate().is_err());
    }

    #[test]
    fn test_execute_refuses_empty_validation_split() {
        // 0.0 fails validation; 0.01 of 20 images rounds to no validation images
        for val_fraction in [0.0, 0.01] {
            let dir = temp_dir(&format!("noval-{val_fraction}"));
            let cfg = TrainConfig { val_fraction, ..tiny_config(&dir) };
            let use_case = TrainUseCase::with_source(cfg, Box::new(StripeSource));

            assert!(use_case.execute().is_err(), "val_fraction {val_fraction} was accepted");
            let csv = std::path::Path::new(&dir).join("metrics.csv");
            assert!(!csv.exists() || std::fs::read_to_string(&csv).unwrap().lines().count() <= 1);

            let _ = std::fs::remove_dir_all(&dir);
        }
    }

    #[test]
    fn test_model_config_carries_architecture() {
        let cfg = TrainConfig { n_step: 3, g_size: 5, ..TrainConfig::default() };
        let model_cfg = cfg.model_config();
        assert_eq!(model_cfg.n_step, 3);
        assert_eq!(model_cfg.g_size, 5);
        assert_eq!(model_cfg.n_classes, 10);
        assert_eq!(model_cfg.loc_variance, LOC_VARIANCE);
    }

    #[test]
    fn test_execute_trains_and_saves_source_size() {
        let dir = temp_dir("train");
        let use_case = TrainUseCase::with_source(tiny_config(&dir), Box::new(StripeSource));

        let history = use_case.execute().unwrap();
        assert_eq!(history.len(), 1);

        let saved = CheckpointManager::new(&dir).load_config().unwrap();
        assert_eq!(saved.in_size, 8);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_default_load_at_bounds() {
        assert_eq!(StripeSource.load_at(5).unwrap().label, 1);
        assert!(StripeSource.load_at(20).is_err());
    }
}
