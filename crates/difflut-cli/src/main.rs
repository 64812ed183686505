//! difflut - inspect, verify and time the differentiable 3D LUT kernels

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use difflut_lut::Interpolation;
use difflut_ops::{InputGradient, ScatterStrategy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "difflut")]
#[command(author, version, about = "Differentiable 3D LUT kernel tool")]
#[command(long_about = "
Inspect grid geometry, verify the forward/backward kernels on random data,
and time them.

Examples:
  difflut info --dim 33                  # Bin geometry and memory use
  difflut info --dim 17 --json
  difflut check                          # D=17, N=10, 4x4 images
  difflut check --dim 33 --batch 4 --width 64 --height 64 --seed 7
  difflut check --config kernel.yaml --json
  difflut bench --dim 33 --width 512 --height 512 --strategy atomic
  difflut -j 4 -vv bench --iters 20
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bin geometry and memory footprint of a grid
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Verify kernel properties on seeded random data
    #[command(visible_alias = "c")]
    Check(CheckArgs),

    /// Time forward and backward
    #[command(visible_alias = "b")]
    Bench(BenchArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Grid vertices per axis
    #[arg(short, long, default_value = "17")]
    dim: usize,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

/// Batch size and content shared by `check` and `bench`.
#[derive(Args, Clone)]
struct DataArgs {
    /// Grid vertices per axis
    #[arg(short, long, default_value = "17")]
    dim: usize,

    /// Images per batch
    #[arg(short = 'n', long, default_value = "10")]
    batch: usize,

    /// Image width
    #[arg(short, long, default_value = "4")]
    width: usize,

    /// Image height
    #[arg(short = 'H', long, default_value = "4")]
    height: usize,

    /// Random seed
    #[arg(short, long, default_value = "0")]
    seed: u64,
}

/// Kernel settings: an optional YAML file, then flag overrides.
#[derive(Args, Clone, Default)]
struct KernelArgs {
    /// YAML kernel config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interpolation: trilinear, tetrahedral
    #[arg(short, long)]
    interp: Option<Interpolation>,

    /// Scatter strategy: serial, per-worker, atomic
    #[arg(long)]
    strategy: Option<ScatterStrategy>,

    /// Input gradient: pass-through, geometric
    #[arg(long)]
    input_gradient: Option<InputGradient>,

    /// Smallest batch (in pixels) run on the thread pool
    #[arg(long)]
    min_parallel: Option<usize>,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    data: DataArgs,

    #[command(flatten)]
    kernel: KernelArgs,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BenchArgs {
    #[command(flatten)]
    data: DataArgs,

    #[command(flatten)]
    kernel: KernelArgs,

    /// Timed iterations per pass
    #[arg(long, default_value = "10")]
    iters: usize,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Info(args) => commands::info::run(args, cli.verbose),
        Commands::Check(args) => commands::check::run(args, cli.verbose),
        Commands::Bench(args) => commands::bench::run(args, cli.verbose),
    }
}
