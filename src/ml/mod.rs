// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn tensor code lives in this layer.
//
//   glimpse.rs    — crops a fixed-size patch per image
//   policy.rs     — location proposal, Gaussian sampling, ln_p
//   model.rs      — encoders, glimpse network, recurrent core,
//                   action head; the train/evaluate and predict
//                   calls
//   loss.rs       — cross-entropy + REINFORCE with a running
//                   reward baseline
//   trainer.rs    — training session and epoch loop
//   inferencer.rs — loads a checkpoint for the predict call
//   device.rs     — concrete backend choice
//
// Reference: Mnih et al. (2014) Recurrent Models of Visual Attention
//            Williams (1992) REINFORCE

/// Glimpse extraction
pub mod glimpse;

/// Location policy
pub mod policy;

/// Recurrent attention model architecture
pub mod model;

/// Hybrid supervised / policy-gradient loss
pub mod loss;

/// Training session and loop with validation and checkpointing
pub mod trainer;

/// Checkpoint loading for single-image prediction
pub mod inferencer;

/// Backend selection
pub mod device;
