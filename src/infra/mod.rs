// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by the train and predict workflows:
//
//   checkpoint.rs — Saving and loading model weights with Burn's
//                   CompactRecorder, plus the TrainConfig JSON
//                   that lets predict rebuild the architecture.
//
//   metrics.rs    — Per-epoch loss / accuracy / baseline rows in
//                   a CSV file for plotting learning curves.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
