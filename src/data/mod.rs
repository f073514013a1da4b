// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Gets labelled images from disk into tensor batches:
//
//   MNIST (burn vision dataset)
//       │
//       ▼
//   MnistSource       → reads items, flattens 28x28 grids
//       │
//       ▼
//   Normalizer        → scales intensities into [0, 1]
//       │
//       ▼
//   split_train_val   → seeded shuffle + split
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   GlimpseBatcher    → stacks samples into [N, in, in] + labels
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop

/// Loads MNIST through burn's vision datasets
pub mod loader;

/// Scales raw pixel intensities into [0, 1]
pub mod preprocessor;

/// Implements Burn's Dataset trait for labelled images
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
