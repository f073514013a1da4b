// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains the attention model on MNIST
//   2. `predict` — loads a checkpoint, classifies one image and
//                  prints the glimpse trajectory

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

use crate::application::predict_use_case::{PredictOutcome, PredictUseCase};

/// The main CLI struct
#[derive(Parser, Debug)]
#[command(
    name = "recurrent-attention",
    version = "0.1.0",
    about = "Train a recurrent attention model on MNIST, then watch where it looks."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training, checkpoints in: {}", args.checkpoint_dir);

    let use_case = TrainUseCase::new(args.into());
    let history  = use_case.execute()?;

    if let Some(best) = history.iter().max_by(|a, b| a.val_acc.total_cmp(&b.val_acc)) {
        println!(
            "Training complete. Best val_acc={:.1}% at epoch {}.",
            best.val_acc * 100.0, best.epoch
        );
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let use_case = PredictUseCase::new(args.checkpoint_dir.clone());
    let outcome  = use_case.execute(args.image_choice(), args.init_location())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &PredictOutcome) {
    match (outcome.true_label, outcome.is_correct()) {
        (Some(label), Some(correct)) => println!(
            "\nPredicted: {} (true label {}, {})",
            outcome.prediction.label,
            label,
            if correct { "correct" } else { "wrong" }
        ),
        _ => println!("\nPredicted: {}", outcome.prediction.label),
    }

    println!("\n step |    row |    col | pixel");
    println!("------+--------+--------+---------");
    for (i, (loc, px)) in outcome
        .prediction
        .trajectory
        .iter()
        .zip(&outcome.pixel_path)
        .enumerate()
    {
        println!(
            " {:>4} | {:>6.3} | {:>6.3} | ({:>2}, {:>2})",
            i + 1, loc.row, loc.col, px.row, px.col
        );
    }
}
