// ============================================================
// Layer 5 — Loss / Reward Composer
// ============================================================
// Turns a rollout into one scalar training loss:
//
//   loss = CE(logits, labels)                          (always)
//        + sum_i ln_p_i * (r_i - b) / batch_size       (Train)
//
//   r_i = 1 if argmax(logits_i) == label_i else 0
//   b   ← 0.9 * b + 0.1 * mean(r)                      (Train)
//
// Two graphs meet here only by addition. The cross-entropy term
// backpropagates through the action head and the core; the
// REINFORCE term backpropagates through ln_p into the location
// head. Reward and baseline are plain numbers to autodiff.
//
// The baseline is updated first and the updated value is used
// in the same batch's loss term.

use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};
use serde::{Deserialize, Serialize};

use crate::ml::model::Rollout;

/// Weight the old baseline keeps on every update.
pub const BASELINE_DECAY: f64 = 0.9;

/// Exponential moving average of the batch reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBaseline {
    value: f64,
    decay: f64,
}

impl RewardBaseline {
    pub fn new() -> Self {
        Self { value: 0.0, decay: BASELINE_DECAY }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Fold one batch's mean reward in and return the new value.
    pub fn update(&mut self, mean_reward: f64) -> f64 {
        self.value = self.decay * self.value + (1.0 - self.decay) * mean_reward;
        self.value
    }
}

impl Default for RewardBaseline {
    fn default() -> Self {
        Self::new()
    }
}

/// What one train or evaluate call reports back.
#[derive(Debug)]
pub struct StepReport<B: Backend> {
    /// Scalar loss — shape [1]
    pub loss: Tensor<B, 1>,

    /// Fraction of the batch classified correctly
    pub accuracy: f64,

    /// Mean correctness reward; equals accuracy
    pub mean_reward: f64,

    /// Baseline after this call's update (Train only)
    pub baseline: Option<f64>,
}

/// Owns the reward baseline and composes the hybrid loss.
#[derive(Debug, Clone, Default)]
pub struct LossComposer {
    baseline: RewardBaseline,
}

impl LossComposer {
    pub fn new() -> Self {
        Self { baseline: RewardBaseline::new() }
    }

    pub fn baseline(&self) -> f64 {
        self.baseline.value()
    }

    /// Cross-entropy plus REINFORCE; updates the baseline once.
    pub fn compose_train<B: Backend>(
        &mut self,
        rollout: Rollout<B>,
        labels:  Tensor<B, 1, Int>,
    ) -> StepReport<B> {
        let [batch_size] = labels.dims();
        let ce      = supervised_loss(rollout.logits.clone(), labels.clone());
        let rewards = correctness(rollout.logits, labels);

        // Reward is complete before the baseline moves
        let mean_reward = rewards.clone().sum().into_scalar().elem::<f64>() / batch_size as f64;
        let baseline    = self.baseline.update(mean_reward);

        let loss = match rollout.accum_ln_p {
            Some(ln_p) => ce + reinforce_term(ln_p, rewards, baseline),
            None       => ce,
        };

        tracing::trace!(mean_reward, baseline, "composed training loss");

        StepReport { loss, accuracy: mean_reward, mean_reward, baseline: Some(baseline) }
    }

    /// Cross-entropy and accuracy only.
    pub fn compose_eval<B: Backend>(rollout: Rollout<B>, labels: Tensor<B, 1, Int>) -> StepReport<B> {
        let [batch_size] = labels.dims();
        let loss     = supervised_loss(rollout.logits.clone(), labels.clone());
        let rewards  = correctness(rollout.logits, labels);
        let accuracy = rewards.sum().into_scalar().elem::<f64>() / batch_size as f64;

        StepReport { loss, accuracy, mean_reward: accuracy, baseline: None }
    }
}

/// Batch-mean softmax cross-entropy.
pub fn supervised_loss<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, labels)
}

/// 1.0 where the argmax matches the label, else 0.0. Detached.
pub fn correctness<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    // argmax(1) returns [batch, 1]
    logits
        .argmax(1)
        .flatten::<1>(0, 1)
        .equal(labels)
        .float()
        .detach()
}

/// `sum(ln_p * (reward - baseline)) / batch_size`.
/// Only `accum_ln_p` carries gradient.
pub fn reinforce_term<B: Backend>(
    accum_ln_p: Tensor<B, 1>,
    rewards:    Tensor<B, 1>,
    baseline:   f64,
) -> Tensor<B, 1> {
    let [batch_size] = accum_ln_p.dims();
    let advantage = rewards.sub_scalar(baseline).detach();
    (accum_ln_p * advantage).sum().div_scalar(batch_size as f64)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend  = NdArray;
    type TestAutodiff = Autodiff<NdArray>;

    #[test]
    fn test_baseline_first_update() {
        let mut b = RewardBaseline::new();
        assert!((b.update(0.5) - 0.05).abs() < 1e-12);
        assert!((b.update(0.5) - (0.9 * 0.05 + 0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_converges_geometrically() {
        let r = 0.75;
        let mut b = RewardBaseline::new();
        let mut prev_err = (b.value() - r).abs();
        for _ in 0..60 {
            b.update(r);
            let err = (b.value() - r).abs();
            assert!((err - 0.9 * prev_err).abs() < 1e-9);
            prev_err = err;
        }
        assert!(prev_err < 0.75 * 0.9f64.powi(59));
    }

    #[test]
    fn test_correctness_reward() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[0.1, 2.0, 0.3], [5.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            &device,
        );
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 2], &device);

        let r: Vec<f32> = correctness(logits, labels).into_data().iter::<f32>().collect();
        assert_eq!(r, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_reinforce_gradient_is_advantage_over_batch() {
        let device  = Default::default();
        let ln_p    = Tensor::<TestAutodiff, 1>::from_floats([2.0, 3.0], &device).require_grad();
        let rewards = Tensor::<TestAutodiff, 1>::from_floats([1.0, 0.0], &device);

        let term = reinforce_term(ln_p.clone(), rewards, 0.5);
        // (2 * 0.5 + 3 * -0.5) / 2
        let value: f64 = term.clone().into_scalar().elem::<f64>();
        assert!((value + 0.25).abs() < 1e-6);

        let grads = term.backward();
        let g: Vec<f32> = ln_p.grad(&grads).unwrap().into_data().iter::<f32>().collect();
        assert!((g[0] - 0.25).abs() < 1e-6);
        assert!((g[1] + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_reward_carries_no_gradient() {
        let device  = Default::default();
        let logits  = Tensor::<TestAutodiff, 2>::from_floats([[1.0, 0.0], [0.0, 1.0]], &device)
            .require_grad();
        let labels  = Tensor::<TestAutodiff, 1, Int>::from_ints([0, 0], &device);
        let ln_p    = Tensor::<TestAutodiff, 1>::from_floats([1.0, 1.0], &device).require_grad();

        let rewards = correctness(logits.clone(), labels);
        let grads   = reinforce_term(ln_p, rewards, 0.0).backward();
        assert!(logits.grad(&grads).is_none());
    }

    #[test]
    fn test_compose_train_updates_baseline_once() {
        let device = Default::default();
        let rollout = Rollout::<TestBackend> {
            logits:     Tensor::from_floats([[3.0, 0.0], [3.0, 0.0]], &device),
            accum_ln_p: Some(Tensor::from_floats([1.0, 2.0], &device)),
            locations:  vec![],
        };
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 1], &device);

        let mut composer = LossComposer::new();
        let report = composer.compose_train(rollout, labels);

        assert_eq!(report.mean_reward, 0.5);
        assert_eq!(report.accuracy, 0.5);
        assert!((composer.baseline() - 0.05).abs() < 1e-12);
        assert_eq!(report.baseline, Some(composer.baseline()));

        // CE part: both rows have logit gap 3; policy part uses the updated baseline
        let ce = (1.0f64 + (-3.0f64).exp()).ln() * 0.5 + (3.0 + (1.0f64 + (-3.0f64).exp()).ln()) * 0.5;
        let pg = (1.0 * (1.0 - 0.05) + 2.0 * (0.0 - 0.05)) / 2.0;
        let loss: f64 = report.loss.into_scalar().elem::<f64>();
        assert!((loss - (ce + pg)).abs() < 1e-4, "loss {loss} != {}", ce + pg);
    }

    #[test]
    fn test_compose_eval_reports_accuracy() {
        let device = Default::default();
        let rollout = Rollout::<TestBackend> {
            logits:     Tensor::from_floats([[0.0, 1.0], [0.0, 1.0], [1.0, 0.0], [1.0, 0.0]], &device),
            accum_ln_p: None,
            locations:  vec![],
        };
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1, 0], &device);

        let report = LossComposer::compose_eval(rollout, labels);
        assert_eq!(report.accuracy, 0.75);
        assert!(report.baseline.is_none());
    }
}
