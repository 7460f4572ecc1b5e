use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use trajio::cli;

/// Convert Quantum ESPRESSO output to extxyz format.
#[derive(Parser)]
struct Args {
    /// Path to the Quantum ESPRESSO output file.
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the output extxyz file.
    #[arg(short, long)]
    output: PathBuf,

    /// Write every ionic step instead of only the final one.
    #[arg(long)]
    all: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging();

    cli::report(
        trajio::tools::qe2extxyz(&args.input, &args.output, args.all).map(|_| {
            format!(
                "Conversion complete: {} -> {}",
                args.input.display(),
                args.output.display()
            )
        }),
    )
}
