//! Marker-line scanning of CP2K input and output files.

use crate::error::TrajError;
use crate::unit_cell::CellParameters;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENERGY_MARKER: &str = "ENERGY| Total FORCE_EVAL ( QS ) energy [a.u.]:";
pub const LATTICE_MARKER: &str = "ABC";
pub const ANGLES_MARKER: &str = "ALPHA_BETA_GAMMA";

/// Finds the first line of a text file containing a marker.
pub struct MarkerScanner {
    path: PathBuf,
    content: String,
}

impl MarkerScanner {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrajError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TrajError::NotFound(path.to_path_buf()));
        }
        Ok(MarkerScanner {
            path: path.to_path_buf(),
            content: fs::read_to_string(path)?,
        })
    }

    pub fn from_content(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        MarkerScanner {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn find(&self, marker: &str) -> Option<&str> {
        self.content.lines().find(|line| line.contains(marker))
    }

    /// Like [`MarkerScanner::find`], failing with the whole file content
    /// when the marker is absent.
    pub fn require(&self, marker: &str) -> Result<&str, TrajError> {
        self.find(marker).ok_or_else(|| TrajError::Parse {
            marker: marker.to_string(),
            path: self.path.clone(),
            content: self.content.clone(),
        })
    }
}

/// Numbers following `keyword` on `line`, skipping unit tags like `[angstrom]`.
fn numbers_after(line: &str, keyword: &str) -> Result<Vec<f64>, TrajError> {
    let rest = match line.find(keyword) {
        Some(start) => &line[start + keyword.len()..],
        None => line,
    };
    rest.split_whitespace()
        .take_while(|token| !token.starts_with('#') && !token.starts_with('!'))
        .filter(|token| !(token.starts_with('[') && token.ends_with(']')))
        .map(|token| token.parse::<f64>().map_err(TrajError::from))
        .collect()
}

/// Total energy in Hartree from a CP2K log.
pub fn read_energy(scanner: &MarkerScanner) -> Result<f64, TrajError> {
    let line = scanner.require(ENERGY_MARKER)?;
    let token = line.split_whitespace().last().ok_or(TrajError::MissingToken)?;
    Ok(token.parse()?)
}

/// Cell parameters from the `ABC` keyword of a CP2K input, with angles from
/// `ALPHA_BETA_GAMMA` when that keyword is present.
pub fn read_lattice(scanner: &MarkerScanner) -> Result<CellParameters, TrajError> {
    let line = scanner.require(LATTICE_MARKER)?;
    debug!("lattice line: {}", line.trim());
    let mut parameters = CellParameters::from_slice(&numbers_after(line, LATTICE_MARKER)?)?;

    if let Some(line) = scanner.find(ANGLES_MARKER) {
        match numbers_after(line, ANGLES_MARKER)?[..] {
            [alpha, beta, gamma] => parameters.angles = [alpha, beta, gamma],
            _ => {
                return Err(TrajError::InvalidArgument(format!(
                    "{ANGLES_MARKER} needs 3 angles, got '{}'",
                    line.trim()
                )))
            }
        }
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn energy_from_log() {
        let scanner = MarkerScanner::open("./src/tests-data/cp2k/ref.out").unwrap();
        assert_approx_eq!(read_energy(&scanner).unwrap(), -123.456);
    }

    #[test]
    fn lattice_from_input() {
        let scanner = MarkerScanner::open("./src/tests-data/cp2k/ref.inp").unwrap();
        let parameters = read_lattice(&scanner).unwrap();
        assert_eq!(parameters.lengths, [12.42, 12.42, 12.42]);
        assert_eq!(parameters.angles, [90.0, 90.0, 90.0]);
    }

    #[test]
    fn six_parameters_and_angle_keyword() {
        let scanner = MarkerScanner::from_content("inline.inp", "&CELL\n  ABC 5 6 7 90 90 120\n&END CELL\n");
        let parameters = read_lattice(&scanner).unwrap();
        assert_eq!(parameters.lengths, [5.0, 6.0, 7.0]);
        assert_eq!(parameters.angles, [90.0, 90.0, 120.0]);

        let scanner = MarkerScanner::from_content(
            "inline.inp",
            "&CELL\n  ABC [angstrom] 5 5 5\n  ALPHA_BETA_GAMMA 60 60 60\n&END CELL\n",
        );
        let parameters = read_lattice(&scanner).unwrap();
        assert_eq!(parameters.lengths, [5.0; 3]);
        assert_eq!(parameters.angles, [60.0; 3]);
    }

    #[test]
    fn missing_marker_shows_content() {
        let scanner = MarkerScanner::from_content("empty.out", "SCF run NOT converged\n");
        let err = read_energy(&scanner).unwrap_err();
        assert!(matches!(err, TrajError::Parse { .. }));
        let message = err.to_string();
        assert!(message.contains(ENERGY_MARKER));
        assert!(message.contains("empty.out"));
        assert!(message.contains("SCF run NOT converged"));
    }

    #[test]
    fn missing_lattice_shows_content() {
        let content = "&CELL\n  PERIODIC XYZ\n&END CELL\n";
        let scanner = MarkerScanner::from_content("noabc.inp", content);
        let err = read_lattice(&scanner).unwrap_err();
        match &err {
            TrajError::Parse { marker, content: scanned, .. } => {
                assert_eq!(marker, LATTICE_MARKER);
                assert_eq!(scanned, content);
            }
            other => panic!("unexpected error {other}"),
        }
        let message = err.to_string();
        assert!(message.contains("ABC"));
        assert!(message.contains("PERIODIC XYZ"));
    }
}
