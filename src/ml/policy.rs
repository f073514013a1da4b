// ============================================================
// Layer 5 — Location Policy
// ============================================================
// Decides where the next glimpse goes.
//
// The network always produces a deterministic proposal
// (tanh, so already in [-1, 1]). What happens next depends on
// the mode:
//
//   Infer: the proposal is the next location. Done.
//
//   Train: draw   s ~ N(proposal, variance)   per coordinate,
//          clip   s into [-1, 1],
//          score  ln_p = 0.5 * ||s - proposal||² / variance
//
// ln_p is the Gaussian negative log-likelihood without its
// constant terms; with a fixed variance those constants carry
// no gradient. The sampled location is detached: no gradient
// flows through the sampling op. The policy learns only through
// ln_p, which the loss composer weights by (reward - baseline).

use burn::{prelude::*, tensor::Distribution};

use crate::ml::model::Mode;

/// Exploration variance of the location Gaussian.
pub const LOC_VARIANCE: f64 = 0.03;

/// One policy decision for a whole batch.
#[derive(Debug, Clone)]
pub struct PolicySample<B: Backend> {
    /// Clipped sampled location — shape [batch, 2], detached
    pub location: Tensor<B, 2>,

    /// Per-example negative log-likelihood term — shape [batch]
    pub ln_p: Tensor<B, 1>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationPolicy {
    variance: f64,
}

impl LocationPolicy {
    pub fn new(variance: f64) -> Self {
        assert!(variance > 0.0, "location variance must be positive, got {variance}");
        Self { variance }
    }

    pub fn stddev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Where the first glimpse of a forward pass goes.
    ///
    /// Training explores from N(0, stddev), unclipped (the pixel
    /// conversion clamps it); evaluation
    /// always starts at the image center.
    pub fn initial_location<B: Backend>(
        &self,
        mode:       Mode,
        batch_size: usize,
        device:     &B::Device,
    ) -> Tensor<B, 2> {
        match mode {
            Mode::Train => Tensor::<B, 2>::random(
                [batch_size, 2],
                Distribution::Normal(0.0, self.stddev()),
                device,
            ),
            Mode::Infer => Tensor::zeros([batch_size, 2], device),
        }
    }

    /// Sample around `proposal` with fresh Gaussian noise.
    pub fn sample<B: Backend>(&self, proposal: Tensor<B, 2>) -> PolicySample<B> {
        let noise = Tensor::<B, 2>::random(
            proposal.shape(),
            Distribution::Normal(0.0, self.stddev()),
            &proposal.device(),
        );
        self.perturb(proposal, noise)
    }

    /// Apply the given noise to `proposal`, clip, and score.
    pub fn perturb<B: Backend>(&self, proposal: Tensor<B, 2>, noise: Tensor<B, 2>) -> PolicySample<B> {
        let location = (proposal.clone().detach() + noise)
            .clamp(-1.0, 1.0)
            .detach();
        let ln_p = self.neg_log_likelihood(location.clone(), proposal);
        PolicySample { location, ln_p }
    }

    /// `0.5 * sum((sampled - proposal)²) / variance`, one value per row.
    /// Differentiable with respect to `proposal` only.
    pub fn neg_log_likelihood<B: Backend>(
        &self,
        sampled:  Tensor<B, 2>,
        proposal: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        (sampled.detach() - proposal)
            .powf_scalar(2.0)
            .sum_dim(1)
            .flatten::<1>(0, 1)
            .mul_scalar(0.5 / self.variance)
    }
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self::new(LOC_VARIANCE)
    }
}
