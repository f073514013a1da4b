// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer asks for labelled images through this
// trait and never learns where they came from. MnistSource is
// the production implementation; tests feed in-memory images.

use anyhow::{Context, Result};

use crate::data::dataset::ImageSample;

// ─── ImageSource ──────────────────────────────────────────────────────────────
/// Any component that can provide labelled square images.
///
/// Implementations:
///   - MnistSource  → burn's MNIST train/test splits
///   - (tests)      → hand-built images
pub trait ImageSource {
    /// Side length of every image this source yields.
    fn image_size(&self) -> usize;

    /// Load all available samples from this source.
    fn load_all(&self) -> Result<Vec<ImageSample>>;

    /// Load one sample by index. Sources with random access
    /// should override this instead of loading everything.
    fn load_at(&self, index: usize) -> Result<ImageSample> {
        let mut all = self.load_all()?;
        let len = all.len();
        ensure_index(index, len)?;
        Ok(all.swap_remove(index))
    }
}

fn ensure_index(index: usize, len: usize) -> Result<()> {
    (index < len)
        .then_some(())
        .with_context(|| format!("image index {index} out of range ({len} images)"))
}
