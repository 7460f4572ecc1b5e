use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use trajio::cli;

/// Convert a POSCAR (or any readable structure) to extended XYZ.
#[derive(Parser)]
struct Args {
    /// Input structure file.
    #[arg(short)]
    input: PathBuf,

    /// Output file.
    #[arg(short)]
    output: PathBuf,

    /// Supercell repeats along a, b and c.
    #[arg(short = 'c', num_args = 3, value_names = ["NX", "NY", "NZ"], default_values_t = [1, 1, 1])]
    supercell: Vec<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging();

    let repeat = match args.supercell[..] {
        [nx, ny, nz] => [nx, ny, nz],
        _ => [1, 1, 1],
    };
    cli::report(
        trajio::tools::pos2xyz(&args.input, &args.output, repeat)
            .map(|natoms| format!("{natoms} atoms written to {}", args.output.display())),
    )
}
