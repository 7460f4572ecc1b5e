//! Combine CP2K position and force trajectories into an extended XYZ
//! training set with `REF_energy` and `REF_forces` labels.
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use trajio::cli;
use trajio::unit_cell::CellParameters;

/// Process positions and forces.
#[derive(Parser)]
struct Args {
    /// Name of the positions XYZ file.
    #[arg(short, long)]
    positions: PathBuf,

    /// Name of the forces XYZ file.
    #[arg(short, long)]
    forces: PathBuf,

    /// Cell dimensions: a b c alpha beta gamma.
    #[arg(long, num_args = 6, required = true, value_names = ["A", "B", "C", "ALPHA", "BETA", "GAMMA"])]
    cell: Vec<f64>,

    /// Stride for selecting frames.
    #[arg(long, default_value = "1")]
    stride: NonZeroUsize,

    /// Output extended XYZ file.
    #[arg(short, long, default_value = "combined.extxyz")]
    output: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse_from(cli::normalize_args(std::env::args_os(), &["cell", "stride"]));
    cli::init_logging();

    cli::report(
        CellParameters::from_slice(&args.cell)
            .and_then(|cell| {
                trajio::tools::cp2mace(&args.positions, &args.forces, &cell, args.stride, &args.output)
            })
            .map(|count| format!("{count} frames written to {}", args.output.display())),
    )
}
