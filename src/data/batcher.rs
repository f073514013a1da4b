// ============================================================
// Layer 4 — Glimpse Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<ImageSample>
// into the two tensors a forward pass needs.
//
//   Input:  N samples, each with in_size * in_size pixels
//   Output: images [N, in_size, in_size], labels [N]
//
// All pixels of all samples go into one flat Vec<f32> in sample
// order, then a single reshape gives every sample its own
// [in_size, in_size] slab:
//   [s1_p1, ..., s1_pP, s2_p1, ..., sN_pP] → [N, in, in]

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ImageSample;

// ─── GlimpseBatch ─────────────────────────────────────────────────────────────
/// A batch of images ready for the attention model.
#[derive(Debug, Clone)]
pub struct GlimpseBatch<B: Backend> {
    /// Images — shape: [batch_size, in_size, in_size]
    pub images: Tensor<B, 3>,

    /// Ground truth classes — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

// ─── GlimpseBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct GlimpseBatcher {
    /// Side length every sample must have
    pub in_size: usize,
}

impl GlimpseBatcher {
    pub fn new(in_size: usize) -> Self {
        Self { in_size }
    }

    /// Build the [in_size, in_size] tensor for a single sample
    /// (used by the predict call, which is not batched).
    pub fn image<B: Backend>(&self, sample: &ImageSample, device: &B::Device) -> Tensor<B, 2> {
        assert_eq!(
            sample.pixels.len(),
            self.in_size * self.in_size,
            "sample has {} pixels, expected {}x{}",
            sample.pixels.len(), self.in_size, self.in_size,
        );
        Tensor::<B, 1>::from_floats(sample.pixels.as_slice(), device)
            .reshape([self.in_size, self.in_size])
    }
}

impl<B: Backend> Batcher<B, ImageSample, GlimpseBatch<B>> for GlimpseBatcher {
    fn batch(&self, items: Vec<ImageSample>, device: &B::Device) -> GlimpseBatch<B> {
        let batch_size = items.len();
        let pixels_per = self.in_size * self.in_size;

        // A mismatched sample would silently shift every later row
        for s in &items {
            assert_eq!(s.pixels.len(), pixels_per, "sample with wrong pixel count in batch");
        }

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| s.pixels.iter().copied())
            .collect();

        let labels: Vec<i32> = items
            .iter()
            .map(|s| s.label as i32)
            .collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), device)
            .reshape([batch_size, self.in_size, self.in_size]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device);

        GlimpseBatch { images, labels }
    }
}
