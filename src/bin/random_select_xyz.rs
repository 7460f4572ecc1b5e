//! Pick snapshots out of a large XYZ trajectory without loading it whole.
use clap::{ArgGroup, Parser, ValueEnum};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use trajio::cli;
use trajio::format::FormatKind;
use trajio::transform::sample::Selection;

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Xyz,
    Extxyz,
}

/// Select snapshots from an XYZ trajectory.
#[derive(Parser)]
#[command(group(ArgGroup::new("selection").required(true).args(["n", "indices", "stride"])))]
struct Args {
    /// Input XYZ file.
    #[arg(short, long, default_value = "md.xyz")]
    input: PathBuf,

    /// Output XYZ file.
    #[arg(short, long, default_value = "selected_snapshots.xyz")]
    output: PathBuf,

    /// Number of snapshots to select at random.
    #[arg(short)]
    n: Option<usize>,

    /// Specific snapshot indices to select.
    #[arg(long, num_args = 1..)]
    indices: Option<Vec<usize>>,

    /// Keep every N-th snapshot.
    #[arg(long)]
    stride: Option<NonZeroUsize>,

    /// Seed for a reproducible random selection.
    #[arg(long, requires = "n")]
    seed: Option<u64>,

    /// Output flavour.
    #[arg(long, value_enum, default_value = "xyz")]
    format: OutputFormat,
}

impl Args {
    fn selection(&self) -> Option<Selection> {
        match (self.n, &self.indices, self.stride) {
            (Some(n), _, _) => Some(Selection::Random { n, seed: self.seed }),
            (_, Some(indices), _) => Some(Selection::Indices(indices.clone())),
            (_, _, Some(stride)) => Some(Selection::Stride(stride)),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging();

    let kind = match args.format {
        OutputFormat::Xyz => FormatKind::XYZ,
        OutputFormat::Extxyz => FormatKind::ExtXYZ,
    };
    let Some(selection) = args.selection() else {
        // clap enforces the group
        return ExitCode::from(2);
    };
    cli::report(
        trajio::tools::random_select(&args.input, &args.output, &selection, kind)
            .map(|count| format!("{count} snapshots written to {}", args.output.display())),
    )
}
