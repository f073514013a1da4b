// ============================================================
// Layer 5 — Recurrent Attention Model (Burn)
// ============================================================
// One forward pass runs n_step recurrent transitions. Every
// transition looks at one glimpse:
//
//   location l ──► emb_l ─ relu ─► fc_lg ─┐
//                                          + ─ relu ─► g
//   image x ─ crop(l) ─► emb_x ─ relu ─► fc_xg ─┘
//
//   h' = relu(core_hh(h) + core_gh(g))
//   proposal = tanh(fc_hl(h'))       (next location)
//
// After n_step - 1 moves, the final transition hands h' to the
// action head (fc_ha) instead of proposing a location.
//
// Mode::Train samples each next location around the proposal and
// accumulates the policy's ln_p; Mode::Infer follows proposals.

use anyhow::{ensure, Result};
use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::{relu, tanh},
};

use crate::domain::{
    location::{GlimpseGeometry, Location},
    prediction::Prediction,
};
use crate::ml::{
    glimpse::{extract_glimpses, locations_to_host, pixel_centers},
    loss::{LossComposer, StepReport},
    policy::{LocationPolicy, LOC_VARIANCE},
};

/// Which branch a forward pass takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Stochastic locations, ln_p accumulated, baseline updated
    Train,
    /// Deterministic proposals, no ln_p
    Infer,
}

#[derive(Config, Debug)]
pub struct RamConfig {
    /// Location / glimpse embedding width
    #[config(default = 128)]
    pub n_e: usize,
    /// Recurrent hidden width
    #[config(default = 256)]
    pub n_h: usize,
    /// Input image side length
    #[config(default = 28)]
    pub in_size: usize,
    /// Glimpse side length
    #[config(default = 8)]
    pub g_size: usize,
    /// Recurrent transitions per forward pass
    #[config(default = 6)]
    pub n_step: usize,
    #[config(default = 10)]
    pub n_classes: usize,
    #[config(default = "LOC_VARIANCE")]
    pub loc_variance: f64,
}

impl RamConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RamModel<B> {
        assert!(self.n_step >= 1, "n_step must be at least 1");
        assert!(
            self.g_size >= 1 && self.g_size <= self.in_size,
            "glimpse size {} does not fit a {}x{} image",
            self.g_size, self.in_size, self.in_size
        );

        let linear = |d_in, d_out| LinearConfig::new(d_in, d_out).init(device);
        RamModel {
            emb_l:   linear(2, self.n_e),
            emb_x:   linear(self.g_size * self.g_size, self.n_e),
            fc_lg:   linear(self.n_e, self.n_h),
            fc_xg:   linear(self.n_e, self.n_h),
            core_hh: linear(self.n_h, self.n_h),
            core_gh: linear(self.n_h, self.n_h),
            fc_ha:   linear(self.n_h, self.n_classes),
            fc_hl:   linear(self.n_h, 2),
            n_h:          self.n_h,
            in_size:      self.in_size,
            g_size:       self.g_size,
            n_step:       self.n_step,
            loc_variance: self.loc_variance,
        }
    }
}

#[derive(Module, Debug)]
pub struct RamModel<B: Backend> {
    /// location → embedding
    pub emb_l:   Linear<B>,
    /// flattened glimpse → embedding
    pub emb_x:   Linear<B>,
    /// location embedding → glimpse feature
    pub fc_lg:   Linear<B>,
    /// image embedding → glimpse feature
    pub fc_xg:   Linear<B>,
    /// hidden → hidden
    pub core_hh: Linear<B>,
    /// glimpse feature → hidden
    pub core_gh: Linear<B>,
    /// hidden → class logits
    pub fc_ha:   Linear<B>,
    /// hidden → location proposal
    pub fc_hl:   Linear<B>,
    pub n_h:          usize,
    pub in_size:      usize,
    pub g_size:       usize,
    pub n_step:       usize,
    pub loc_variance: f64,
}

/// Everything a forward pass produced.
#[derive(Debug)]
pub struct Rollout<B: Backend> {
    /// Final-step class logits — shape [batch, n_classes]
    pub logits: Tensor<B, 2>,

    /// Sum of ln_p over all moving steps — shape [batch].
    /// None in Mode::Infer, or when n_step == 1.
    pub accum_ln_p: Option<Tensor<B, 1>>,

    /// n_step locations, each [batch, 2], initial location first
    pub locations: Vec<Tensor<B, 2>>,
}

impl<B: Backend> RamModel<B> {
    pub fn geometry(&self) -> GlimpseGeometry {
        GlimpseGeometry::new(self.in_size, self.g_size)
    }

    pub fn policy(&self) -> LocationPolicy {
        LocationPolicy::new(self.loc_variance)
    }

    /// Glimpse network: fuse "where" and "what" into one feature.
    fn glimpse_feature(&self, images: &Tensor<B, 3>, l: &Tensor<B, 2>) -> Tensor<B, 2> {
        let geometry = self.geometry();
        let centers  = pixel_centers(l, &geometry);
        let patches  = extract_glimpses(images, &centers, &geometry);

        let hx = relu(self.emb_x.forward(patches));
        let hl = relu(self.emb_l.forward(l.clone()));
        relu(self.fc_lg.forward(hl) + self.fc_xg.forward(hx))
    }

    fn core(&self, h: Tensor<B, 2>, g: Tensor<B, 2>) -> Tensor<B, 2> {
        relu(self.core_hh.forward(h) + self.core_gh.forward(g))
    }

    /// Shared by both modes: glimpse, fold into h, propose next location.
    fn propose(
        &self,
        h:      Tensor<B, 2>,
        images: &Tensor<B, 3>,
        l:      &Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let h = self.core(h, self.glimpse_feature(images, l));
        let proposal = tanh(self.fc_hl.forward(h.clone()));
        (h, proposal)
    }

    /// Returns (hidden, sampled location, ln_p).
    fn train_step(
        &self,
        h:      Tensor<B, 2>,
        images: &Tensor<B, 3>,
        l:      &Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 1>) {
        let (h, proposal) = self.propose(h, images, l);
        let sample = self.policy().sample(proposal);
        (h, sample.location, sample.ln_p)
    }

    /// Returns (hidden, proposed location).
    fn infer_step(
        &self,
        h:      Tensor<B, 2>,
        images: &Tensor<B, 3>,
        l:      &Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        self.propose(h, images, l)
    }

    /// Run all n_step transitions starting from `init_l`.
    pub fn rollout(&self, images: &Tensor<B, 3>, init_l: Tensor<B, 2>, mode: Mode) -> Rollout<B> {
        let [batch_size, _, _] = images.dims();
        let device = images.device();

        let mut h = Tensor::<B, 2>::zeros([batch_size, self.n_h], &device);
        let mut l = init_l;
        let mut locations  = Vec::with_capacity(self.n_step);
        let mut accum_ln_p: Option<Tensor<B, 1>> = None;
        locations.push(l.clone());

        for _ in 1..self.n_step {
            match mode {
                Mode::Train => {
                    let (h_next, sampled, ln_p) = self.train_step(h, images, &l);
                    accum_ln_p = Some(match accum_ln_p {
                        Some(acc) => acc + ln_p,
                        None      => ln_p,
                    });
                    h = h_next;
                    l = sampled;
                }
                Mode::Infer => {
                    let (h_next, proposal) = self.infer_step(h, images, &l);
                    h = h_next;
                    l = proposal;
                }
            }
            locations.push(l.clone());
        }

        // Final transition classifies; its location output is never used
        let h = self.core(h, self.glimpse_feature(images, &l));
        let logits = self.fc_ha.forward(h);

        Rollout { logits, accum_ln_p, locations }
    }

    fn check_batch(&self, images: &Tensor<B, 3>, labels: &Tensor<B, 1, Int>) -> Result<usize> {
        let [batch_size, rows, cols] = images.dims();
        let [n_labels] = labels.dims();
        ensure!(batch_size > 0, "empty batch");
        ensure!(
            rows == self.in_size && cols == self.in_size,
            "images are {}x{}, model expects {}x{}",
            rows, cols, self.in_size, self.in_size
        );
        ensure!(
            n_labels == batch_size,
            "{} labels for a batch of {} images", n_labels, batch_size
        );
        Ok(batch_size)
    }

    /// Train/evaluate call: one forward pass plus the composed loss.
    ///
    /// `Mode::Train` samples locations and updates the composer's
    /// baseline exactly once. `Mode::Infer` follows proposals from
    /// the image center and leaves the baseline alone.
    pub fn forward_loss(
        &self,
        images:   Tensor<B, 3>,
        labels:   Tensor<B, 1, Int>,
        mode:     Mode,
        composer: &mut LossComposer,
    ) -> Result<StepReport<B>> {
        let batch_size = self.check_batch(&images, &labels)?;
        let init_l  = self.policy().initial_location(mode, batch_size, &images.device());
        let rollout = self.rollout(&images, init_l, mode);

        Ok(match mode {
            Mode::Train => composer.compose_train(rollout, labels),
            Mode::Infer => LossComposer::compose_eval(rollout, labels),
        })
    }

    /// Evaluation without a composer (nothing to mutate).
    pub fn evaluate(&self, images: Tensor<B, 3>, labels: Tensor<B, 1, Int>) -> Result<StepReport<B>> {
        let batch_size = self.check_batch(&images, &labels)?;
        let init_l  = self.policy().initial_location(Mode::Infer, batch_size, &images.device());
        let rollout = self.rollout(&images, init_l, Mode::Infer);
        Ok(LossComposer::compose_eval(rollout, labels))
    }

    /// Predict call: classify one image and report where the model looked.
    pub fn predict(&self, image: Tensor<B, 2>, init_l: Location) -> Result<Prediction> {
        let [rows, cols] = image.dims();
        ensure!(
            rows == self.in_size && cols == self.in_size,
            "image is {}x{}, model expects {}x{}",
            rows, cols, self.in_size, self.in_size
        );

        let device = image.device();
        let images = image.unsqueeze::<3>();
        let init   = Tensor::<B, 2>::from_floats([init_l.to_array()], &device);

        let rollout = self.rollout(&images, init, Mode::Infer);
        let label = rollout
            .logits
            .argmax(1)
            .into_scalar()
            .elem::<i64>() as usize;

        let trajectory = rollout
            .locations
            .iter()
            .flat_map(|l| locations_to_host(l))
            .collect();

        Ok(Prediction::new(label, trajectory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend  = NdArray;
    type TestAutodiff = Autodiff<NdArray>;

    fn small_config() -> RamConfig {
        RamConfig::new().with_n_e(16).with_n_h(32).with_in_size(12).with_g_size(4).with_n_step(4)
    }

    fn noise_images<B: Backend>(batch: usize, size: usize, device: &B::Device) -> Tensor<B, 3> {
        Tensor::<B, 3>::random([batch, size, size], Distribution::Uniform(0.0, 1.0), device)
    }

    #[test]
    fn test_rollout_shapes_in_both_modes() {
        let device = Default::default();
        let model: RamModel<TestBackend> = small_config().init(&device);
        let images = noise_images::<TestBackend>(3, 12, &device);

        for mode in [Mode::Train, Mode::Infer] {
            let init    = model.policy().initial_location(mode, 3, &device);
            let rollout = model.rollout(&images, init, mode);
            assert_eq!(rollout.logits.dims(), [3, 10]);
            assert_eq!(rollout.locations.len(), 4);
            for l in &rollout.locations {
                assert_eq!(l.dims(), [3, 2]);
            }
            match mode {
                Mode::Train => assert_eq!(rollout.accum_ln_p.map(|t| t.dims()), Some([3])),
                Mode::Infer => assert!(rollout.accum_ln_p.is_none()),
            }
        }
    }

    #[test]
    fn test_single_step_has_no_policy_term() {
        let device = Default::default();
        let model: RamModel<TestBackend> = small_config().with_n_step(1).init(&device);
        let images  = noise_images::<TestBackend>(2, 12, &device);
        let init    = model.policy().initial_location(Mode::Train, 2, &device);
        let rollout = model.rollout(&images, init, Mode::Train);
        assert_eq!(rollout.locations.len(), 1);
        assert!(rollout.accum_ln_p.is_none());
    }

    #[test]
    fn test_inference_proposals_stay_in_range() {
        let device = Default::default();
        let model: RamModel<TestBackend> = small_config().with_n_step(8).init(&device);
        let images = noise_images::<TestBackend>(1, 12, &device);

        let pred = model
            .predict(images.reshape([12, 12]), Location::new(0.3, -0.7))
            .unwrap();
        assert_eq!(pred.steps(), 8);
        assert_eq!(pred.trajectory[0], Location::new(0.3, -0.7));
        assert!(pred.trajectory.iter().all(|l| l.is_within_bounds()));
        assert!(pred.label < 10);
    }

    #[test]
    fn test_predict_on_blank_mnist_sized_image() {
        let device = Default::default();
        let model: RamModel<TestBackend> = RamConfig::new().init(&device);
        let blank = Tensor::<TestBackend, 2>::zeros([28, 28], &device);

        let pred = model.predict(blank, Location::CENTER).unwrap();
        assert_eq!(pred.trajectory.len(), 6);
        assert!(pred.trajectory.iter().all(|l| l.is_within_bounds()));
    }

    #[test]
    fn test_predict_is_idempotent() {
        let device = Default::default();
        let model: RamModel<TestBackend> = small_config().init(&device);
        let image = noise_images::<TestBackend>(1, 12, &device).reshape([12, 12]);

        let a = model.predict(image.clone(), Location::new(0.1, 0.2)).unwrap();
        let b = model.predict(image, Location::new(0.1, 0.2)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_rejects_wrong_image_size() {
        let device = Default::default();
        let model: RamModel<TestBackend> = small_config().init(&device);
        let image = Tensor::<TestBackend, 2>::zeros([10, 12], &device);
        assert!(model.predict(image, Location::CENTER).is_err());
    }

    #[test]
    fn test_forward_loss_rejects_label_mismatch() {
        let device = Default::default();
        let model: RamModel<TestBackend> = small_config().init(&device);
        let images = noise_images::<TestBackend>(2, 12, &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3], &device);
        let mut composer = LossComposer::new();
        assert!(model.forward_loss(images, labels, Mode::Infer, &mut composer).is_err());
    }

    #[test]
    fn test_training_call_end_to_end() {
        let device = Default::default();
        let model: RamModel<TestAutodiff> = RamConfig::new().init(&device);
        let images = noise_images::<TestAutodiff>(2, 28, &device);
        let labels = Tensor::<TestAutodiff, 1, Int>::from_ints([3, 7], &device);

        let mut composer = LossComposer::new();
        let before = composer.baseline();
        let report = model
            .forward_loss(images, labels, Mode::Train, &mut composer)
            .unwrap();

        let loss: f64 = report.loss.clone().into_scalar().elem::<f64>();
        assert!(loss.is_finite());

        let after = composer.baseline();
        assert_eq!(report.baseline, Some(after));
        let mean = report.mean_reward;
        if (mean - before).abs() < 1e-12 {
            assert!((after - before).abs() < 1e-12);
        } else {
            let (lo, hi) = if before < mean { (before, mean) } else { (mean, before) };
            assert!(lo < after && after < hi, "baseline {after} not between {before} and {mean}");
        }

        // The policy head only learns through ln_p; it must be in the graph
        let grads = report.loss.backward();
        assert!(model.fc_hl.weight.val().grad(&grads).is_some());
        assert!(model.fc_ha.weight.val().grad(&grads).is_some());
    }

    #[test]
    fn test_evaluation_leaves_baseline_alone() {
        let device = Default::default();
        let model: RamModel<TestBackend> = small_config().init(&device);
        let images = noise_images::<TestBackend>(4, 12, &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 1, 2, 3], &device);

        let mut composer = LossComposer::new();
        let report = model
            .forward_loss(images.clone(), labels.clone(), Mode::Infer, &mut composer)
            .unwrap();
        assert_eq!(composer.baseline(), 0.0);
        assert!(report.baseline.is_none());
        assert!((0.0..=1.0).contains(&report.accuracy));

        // Deterministic path: evaluate agrees with forward_loss(Infer)
        let again = model.evaluate(images, labels).unwrap();
        let a: f64 = report.loss.into_scalar().elem::<f64>();
        let b: f64 = again.loss.into_scalar().elem::<f64>();
        assert!((a - b).abs() < 1e-9);
    }
}
