use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use trajio::cli;

/// Convert an ASE trajectory to extended XYZ.
#[derive(Parser)]
struct Args {
    /// ASE trajectory file.
    #[arg(short, long, default_value = "md.traj")]
    input: PathBuf,

    /// Output XYZ file.
    #[arg(short, long, default_value = "md.xyz")]
    output: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging();

    cli::report(
        trajio::tools::traj2xyz(&args.input, &args.output)
            .map(|count| format!("{count} frames written to {}", args.output.display())),
    )
}
