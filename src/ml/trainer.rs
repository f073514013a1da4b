// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam.
//
// TrainingSession is the only owner of mutable training state:
//   - the model on the autodiff backend
//   - the optimiser
//   - the LossComposer, which holds the reward baseline
//
// The baseline is created once with the session (at 0.0) and is
// never reset between batches or epochs.
//
// Validation runs `evaluate` on model.valid(): the inner backend,
// no autodiff graph, Mode::Infer (proposals, no sampling).
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::{GlimpseBatch, GlimpseBatcher}, dataset::ImageDataset};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    device::{BackendKind, CpuBackend, GpuBackend},
    loss::LossComposer,
    model::{Mode, RamModel},
};

/// Numbers from one optimiser step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchStats {
    pub loss:     f64,
    pub accuracy: f64,
    pub baseline: f64,
    pub samples:  usize,
}

pub struct TrainingSession<B: AutodiffBackend, O> {
    model:    RamModel<B>,
    optim:    O,
    composer: LossComposer,
    lr:       f64,
}

impl<B, O> TrainingSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<RamModel<B>, B>,
{
    pub fn new(model: RamModel<B>, optim: O, lr: f64) -> Self {
        Self { model, optim, composer: LossComposer::new(), lr }
    }

    pub fn model(&self) -> &RamModel<B> {
        &self.model
    }

    pub fn baseline(&self) -> f64 {
        self.composer.baseline()
    }

    /// Forward (Mode::Train), backward, Adam step.
    pub fn train_batch(&mut self, batch: GlimpseBatch<B>) -> Result<BatchStats> {
        let [samples] = batch.labels.dims();
        let report = self.model.forward_loss(
            batch.images,
            batch.labels,
            Mode::Train,
            &mut self.composer,
        )?;

        let loss: f64 = report.loss.clone().into_scalar().elem::<f64>();
        if !loss.is_finite() {
            tracing::warn!("Non-finite training loss: {}", loss);
        }
        let baseline = report.baseline.unwrap_or_else(|| self.composer.baseline());
        tracing::trace!(loss, reward = report.mean_reward, baseline, "train step");

        let grads = report.loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.lr, self.model.clone(), grads);

        Ok(BatchStats {
            loss,
            accuracy: report.accuracy,
            baseline,
            samples,
        })
    }
}

/// Sample-weighted running mean of loss and accuracy.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpochAverages {
    loss_sum: f64,
    acc_sum:  f64,
    samples:  usize,
}

impl EpochAverages {
    pub fn add(&mut self, loss: f64, accuracy: f64, samples: usize) {
        self.loss_sum += loss * samples as f64;
        self.acc_sum  += accuracy * samples as f64;
        self.samples  += samples;
    }

    pub fn loss(&self) -> f64 {
        if self.samples > 0 { self.loss_sum / self.samples as f64 } else { f64::NAN }
    }

    pub fn accuracy(&self) -> f64 {
        if self.samples > 0 { self.acc_sum / self.samples as f64 } else { 0.0 }
    }
}

/// Mode::Infer pass over every batch; no gradients, no baseline.
pub fn evaluate<B: Backend>(
    model:   &RamModel<B>,
    batches: impl IntoIterator<Item = GlimpseBatch<B>>,
) -> Result<EpochAverages> {
    let mut averages = EpochAverages::default();
    for batch in batches {
        let [samples] = batch.labels.dims();
        let report = model.evaluate(batch.images, batch.labels)?;
        let loss: f64 = report.loss.into_scalar().elem::<f64>();
        averages.add(loss, report.accuracy, samples);
    }
    Ok(averages)
}

/// Pick the backend named in the config and train on it.
pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
) -> Result<Vec<EpochMetrics>> {
    match cfg.backend {
        BackendKind::NdArray => {
            tracing::info!("Using ndarray (CPU) backend");
            train_loop::<burn::backend::Autodiff<CpuBackend>>(
                cfg, train_dataset, val_dataset, ckpt_manager, metrics, Default::default(),
            )
        }
        BackendKind::Wgpu => {
            let device = burn::backend::wgpu::WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<burn::backend::Autodiff<GpuBackend>>(
                cfg, train_dataset, val_dataset, ckpt_manager, metrics, device,
            )
        }
    }
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        B::Device,
) -> Result<Vec<EpochMetrics>> {
    ensure!(train_dataset.len() > 0, "no training images");
    ensure!(val_dataset.len() > 0, "no validation images; raise the validation fraction");

    // ── Build model ───────────────────────────────────────────────────────────
    let model: RamModel<B> = cfg.model_config().init(&device);
    tracing::info!(
        "Model ready: n_e={}, n_h={}, glimpse {}x{} on {}x{}, {} steps",
        cfg.n_e, cfg.n_h, cfg.g_size, cfg.g_size, cfg.in_size, cfg.in_size, cfg.n_step
    );

    let optim = AdamConfig::new().with_epsilon(1e-8).init();
    let mut session = TrainingSession::new(model, optim, cfg.lr);

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(GlimpseBatcher::new(cfg.in_size))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    // Inner backend — no autodiff overhead
    let val_loader = DataLoaderBuilder::new(GlimpseBatcher::new(cfg.in_size))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let mut history = Vec::with_capacity(cfg.epochs);
    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let mut train = EpochAverages::default();
        let mut baseline = session.baseline();
        for batch in train_loader.iter() {
            let stats = session.train_batch(batch)?;
            train.add(stats.loss, stats.accuracy, stats.samples);
            baseline = stats.baseline;
        }

        let model_valid = session.model().valid();
        let val = evaluate(&model_valid, val_loader.iter())?;

        let row = EpochMetrics::new(
            epoch,
            train.loss(),
            train.accuracy(),
            val.loss(),
            val.accuracy(),
            baseline,
        );

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.1}% | val_loss={:.4} | val_acc={:.1}% | baseline={:.3}",
            epoch, cfg.epochs, row.train_loss, row.train_acc * 100.0,
            row.val_loss, row.val_acc * 100.0, row.baseline,
        );

        metrics.log(&row)?;
        ckpt_manager.save_model(session.model(), epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);

        if row.is_improvement(best_val_loss) {
            best_val_loss = row.val_loss;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_val_loss, epoch);
        }
        history.push(row);
    }

    tracing::info!("Training complete! Metrics in '{}'", metrics.csv_path().display());
    Ok(history)
}
