use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use trajio::cli;

/// Label a structure with the energy of a CP2K single point calculation.
#[derive(Parser)]
struct Args {
    /// Input XYZ file.
    #[arg(short, long)]
    input: PathBuf,

    /// Output EXTXYZ file.
    #[arg(short, long)]
    output: PathBuf,

    /// Input CP2K file, read for the ABC cell.
    #[arg(long = "cp2k_in", default_value = "ref.inp")]
    cp2k_in: PathBuf,

    /// Output CP2K file, read for the total energy.
    #[arg(long = "cp2k_out", default_value = "ref.out")]
    cp2k_out: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse_from(cli::normalize_args(
        std::env::args_os(),
        &["cp2k_in", "cp2k_out"],
    ));
    cli::init_logging();

    cli::report(
        trajio::tools::get_atomic_cp2k(&args.input, &args.output, &args.cp2k_in, &args.cp2k_out).map(
            |single_point| {
                let [a, b, c] = single_point.cell.lengths;
                let [alpha, beta, gamma] = single_point.cell.angles;
                format!(
                    "XYZ data written to {} with energy {:.6} eV, lattice [{a}, {b}, {c}, {alpha}, {beta}, {gamma}], and PBC set to True",
                    args.output.display(),
                    single_point.energy
                )
            },
        ),
    )
}
