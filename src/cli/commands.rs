// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, BackendKind, etc.)

use clap::{Args, Subcommand};

use crate::application::{
    predict_use_case::ImageChoice,
    train_use_case::TrainConfig,
};
use crate::domain::location::Location;
use crate::ml::device::BackendKind;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the attention model on MNIST
    Train(TrainArgs),

    /// Classify one image with a trained checkpoint and show where it looked
    Predict(PredictArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory to save checkpoints, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Images per optimiser step
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Seed for the train/validation split and data shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fraction of the training images held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    /// Only use the first N training images
    #[arg(long)]
    pub limit: Option<usize>,

    /// Width of the location and glimpse embeddings
    #[arg(long, default_value_t = 128)]
    pub n_e: usize,

    /// Width of the recurrent hidden state
    #[arg(long, default_value_t = 256)]
    pub n_h: usize,

    /// Side length of each square glimpse
    #[arg(long, default_value_t = 8)]
    pub g_size: usize,

    /// Glimpses per image
    #[arg(long, default_value_t = 6)]
    pub n_step: usize,

    /// Tensor backend: ndarray (CPU) or wgpu (GPU)
    #[arg(long, default_value = "ndarray")]
    pub backend: BackendKind,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            checkpoint_dir: a.checkpoint_dir,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            seed:           a.seed,
            val_fraction:   a.val_fraction,
            limit:          a.limit,
            n_e:            a.n_e,
            n_h:            a.n_h,
            g_size:         a.g_size,
            n_step:         a.n_step,
            backend:        a.backend,
            // Set from the image source at train time
            ..TrainConfig::default()
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Index of the MNIST test image to classify
    #[arg(long, default_value_t = 0, conflicts_with = "blank")]
    pub index: usize,

    /// Use an all-zero image instead of a test image
    #[arg(long)]
    pub blank: bool,

    /// Initial glimpse row in [-1, 1]
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub init_row: f32,

    /// Initial glimpse column in [-1, 1]
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub init_col: f32,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl PredictArgs {
    pub fn image_choice(&self) -> ImageChoice {
        if self.blank { ImageChoice::Blank } else { ImageChoice::Index(self.index) }
    }

    pub fn init_location(&self) -> Location {
        Location::new(self.init_row, self.init_col)
    }
}
