//! Shared plumbing of the command line tools.

use crate::error::TrajError;
use std::ffi::OsString;
use std::process::ExitCode;

/// Rewrites single-dash long options (`-cell`) to the `--cell` form.
///
/// Only the names in `long` are touched, so clustered short flags and
/// negative numbers pass through unchanged.
pub fn normalize_args<I, T>(args: I, long: &[&str]) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(|arg| {
            let arg = arg.into();
            match arg.to_str().and_then(|s| s.strip_prefix('-')) {
                Some(name) if long.contains(&name) => format!("--{name}").into(),
                _ => arg,
            }
        })
        .collect()
}

/// Logs to stderr at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Prints the outcome of a tool and maps it to the process exit code.
pub fn report(result: Result<String, TrajError>) -> ExitCode {
    match result {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_dash_long_options() {
        let args = normalize_args(
            ["cp2mace", "-p", "pos.xyz", "-cell", "10", "10", "10", "90", "90", "90", "-stride", "-5"],
            &["cell", "stride"],
        );
        let args: Vec<_> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            ["cp2mace", "-p", "pos.xyz", "--cell", "10", "10", "10", "90", "90", "90", "--stride", "-5"]
        );
    }

    #[test]
    fn double_dash_untouched() {
        let args = normalize_args(["tool", "--cell", "-cp2k_in"], &["cell", "cp2k_in"]);
        assert_eq!(args, ["tool", "--cell", "--cp2k_in"]);
    }
}
