//! Lumen Application
//!
//! Prepares Gaussian reconstruction runs from a dataset directory:
//! - `prepare`: detect the format, write the snapshot or resume a checkpoint
//! - `local`: load a COLMAP dataset with the local defaults

mod app;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lumen - scene preparation for Gaussian reconstruction
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a dataset of any supported format into a model directory
    Prepare(PrepareArgs),
    /// Load a local COLMAP dataset (no eval split, scale 1.0, shuffled)
    Local(DatasetArgs),
}

#[derive(clap::Args, Debug)]
struct DatasetArgs {
    /// Dataset root
    #[arg(short, long)]
    source_path: PathBuf,

    /// Output directory for the snapshot and checkpoints
    #[arg(short, long)]
    model_path: PathBuf,

    /// Image subfolder (COLMAP)
    #[arg(short, long, default_value = "images")]
    images: String,

    /// Seed of the camera shuffle
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(clap::Args, Debug)]
struct PrepareArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Hold out a test split
    #[arg(long)]
    eval: bool,

    #[arg(long)]
    white_background: bool,

    /// -1 for automatic, 1/2/4/8 to divide, any other value is a target width
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    resolution: i32,

    #[arg(long, default_value = "cuda")]
    data_device: String,

    #[arg(long, default_value_t = 3)]
    sh_degree: u32,

    /// Verbose per-camera logging
    #[arg(long)]
    debug_cuda: bool,

    /// Checkpoint to resume: -1 for the latest, 0 for a fresh start
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    load_iteration: i64,

    /// Resolution scales to build camera lists for
    #[arg(long, value_delimiter = ',', default_value = "1.0")]
    resolution_scales: Vec<f32>,

    /// Keep the dataset camera order
    #[arg(long)]
    no_shuffle: bool,

    /// Write a checkpoint at this iteration after loading
    #[arg(long)]
    save_iteration: Option<u32>,
}

fn main() {
    let args = Args::parse();
    app::init_logging(&args.log_level);

    let result = match args.command {
        Command::Prepare(prepare) => app::prepare(prepare),
        Command::Local(dataset) => app::local(dataset),
    };
    if let Err(e) = result {
        eprintln!("Application error: {}", app::error_chain(&e));
        std::process::exit(1);
    }
}
