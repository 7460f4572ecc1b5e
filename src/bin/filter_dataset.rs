//! Filter frames of an extended XYZ dataset on energy and force thresholds.
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use trajio::cli;
use trajio::transform::filter::Thresholds;

/// Filter XYZ file based on energy and force thresholds.
///
/// A frame is kept when |REF_energy - energy| and the largest per-atom
/// |REF_forces - forces| are both strictly below their thresholds.
#[derive(Parser)]
struct Args {
    /// Input XYZ file path.
    #[arg(short, long)]
    input: PathBuf,

    /// Output XYZ file path.
    #[arg(short, long)]
    output: PathBuf,

    /// Energy threshold (eV).
    #[arg(short, long = "energy_threshold")]
    energy_threshold: f64,

    /// Force threshold (eV/Å).
    #[arg(short, long = "force_threshold")]
    force_threshold: f64,

    /// Keep `energy`, `free_energy`, `stress` and `forces` in the output.
    #[arg(long)]
    keep_candidates: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging();

    cli::report(
        Thresholds::new(args.energy_threshold, args.force_threshold)
            .and_then(|thresholds| {
                trajio::tools::filter_dataset(
                    &args.input,
                    &args.output,
                    &thresholds,
                    !args.keep_candidates,
                )
            })
            .map(|_| format!("Filtered frames have been saved to {}", args.output.display())),
    )
}
