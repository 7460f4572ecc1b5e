// SPDX-License-Identifier: BSD-3-Clause
//
// See LICENSE at the project root for full text.

use crate::atom::Atom;
use crate::elements;
use crate::error::TrajError;
use crate::format::FileFormat;
use crate::frame::Frame;
use crate::unit_cell::UnitCell;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};

const FORMAT: &str = "POSCAR";

/// VASP POSCAR/CONTCAR reader. A file holds exactly one structure.
#[derive(Default)]
pub struct PoscarFormat;

fn format_error(details: impl Into<String>) -> TrajError {
    TrajError::format(FORMAT, details)
}

fn parse_numbers(line: &str, expected: usize, what: &str) -> Result<Vec<f64>, TrajError> {
    let values = line
        .split_whitespace()
        .take(expected)
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != expected {
        return Err(format_error(format!(
            "{what} needs {expected} numbers, got '{}'",
            line.trim()
        )));
    }
    Ok(values)
}

/// `Fe_pv` and `Si/abc123` style POTCAR labels carry the element first.
fn element_of(label: &str) -> &str {
    label.split(['_', '/']).next().unwrap_or(label)
}

impl PoscarFormat {
    pub fn parse(content: &str) -> Result<Frame, TrajError> {
        let mut lines = content.lines();
        let mut next_line = |what: &str| {
            lines
                .next()
                .ok_or_else(|| format_error(format!("file ended before the {what}")))
        };

        let comment = next_line("comment line")?;

        let scale_line = next_line("scaling factor")?;
        let scales = scale_line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()?;

        if !matches!(scales.len(), 1 | 3) {
            return Err(format_error(format!(
                "scaling factor needs 1 or 3 numbers, got '{}'",
                scale_line.trim()
            )));
        }

        let mut vectors = [[0.0; 3]; 3];
        for vector in vectors.iter_mut() {
            let values = parse_numbers(next_line("lattice vectors")?, 3, "lattice vector")?;
            vector.copy_from_slice(&values);
            if scales.len() == 3 {
                vector.iter_mut().zip(&scales).for_each(|(x, s)| *x *= s);
            }
        }
        let mut cell = UnitCell::from_vectors(vectors[0], vectors[1], vectors[2]);

        let factor = match scales[..] {
            [s] if s < 0.0 => (-s / cell.volume()).cbrt(),
            [s] => s,
            _ => 1.0,
        };
        cell.cell_matrix *= factor;
        let axis_scales = match scales[..] {
            [a, b, c] => [a, b, c],
            _ => [factor; 3],
        };

        let mut line = next_line("species or counts")?;
        let species: Vec<String> = if line
            .split_whitespace()
            .next()
            .is_some_and(|t| t.parse::<usize>().is_ok())
        {
            // VASP 4: species only appear in the comment line
            comment.split_whitespace().map(str::to_string).collect()
        } else {
            let names = line
                .split_whitespace()
                .map(|label| element_of(label).to_string())
                .collect();
            line = next_line("atom counts")?;
            names
        };

        let counts = line
            .split_whitespace()
            .map(str::parse::<usize>)
            .collect::<Result<Vec<_>, _>>()?;
        if species.len() < counts.len() {
            return Err(format_error(format!(
                "{} atom counts but only {} species names",
                counts.len(),
                species.len()
            )));
        }

        if let Some(unknown) = species
            .iter()
            .take(counts.len())
            .find(|s| elements::atomic_number(s).is_none())
        {
            return Err(format_error(format!("unknown element '{unknown}' in species list")));
        }

        let mut mode = next_line("coordinate mode")?.trim();
        if mode.starts_with(['S', 's']) {
            mode = next_line("coordinate mode")?.trim();
        }
        let cartesian = mode.starts_with(['C', 'c', 'K', 'k']);

        let natoms = counts.iter().sum();
        let mut frame = Frame::with_capacity(natoms);
        for (symbol, &count) in species.iter().zip(&counts) {
            for _ in 0..count {
                let values = parse_numbers(next_line("atomic positions")?, 3, "position")?;
                let coordinates = [values[0], values[1], values[2]];
                let position = if cartesian {
                    std::array::from_fn(|j| coordinates[j] * axis_scales[j])
                } else {
                    cell.cartesian(coordinates)
                };
                frame.add_atom(Atom::new(symbol.as_str(), position));
            }
        }

        frame.unit_cell = cell;
        frame.pbc = [true; 3];
        Ok(frame)
    }
}

impl FileFormat for PoscarFormat {
    fn read_next(&mut self, reader: &mut BufReader<File>) -> Result<Frame, TrajError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse(&content)
    }

    fn write_next(&mut self, _writer: &mut BufWriter<File>, _frame: &Frame) -> Result<(), TrajError> {
        Err(TrajError::UnsupportedFormat(
            "writing POSCAR files".to_string(),
        ))
    }

    fn forward(&mut self, reader: &mut BufReader<File>) -> Result<Option<u64>, TrajError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        if content.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(reader.stream_position()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Trajectory;
    use assert_approx_eq::assert_approx_eq;
    use std::path::Path;

    #[test]
    fn read_vasp5_direct() {
        let frames = Trajectory::read_all(Path::new("./src/tests-data/poscar/POSCAR")).unwrap();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];

        assert_eq!(frame.size(), 3);
        assert_eq!(frame.symbols(), vec!["Ti", "O", "O"]);
        assert_eq!(frame.pbc, [true; 3]);
        assert_approx_eq!(frame.unit_cell.vector(0)[0], 4.6);
        assert_approx_eq!(frame.unit_cell.vector(2)[2], 2.96);

        let positions = frame.positions();
        assert_approx_eq!(positions[1][0], 0.3 * 4.6);
        assert_approx_eq!(positions[1][1], 0.3 * 4.6);
        assert_approx_eq!(positions[2][2], 0.5 * 2.96);
    }

    #[test]
    fn read_vasp4_cartesian_scaled() {
        let content = "Si\n2.0\n1 0 0\n0 1 0\n0 0 1\n2\nSelective dynamics\nCartesian\n0 0 0 T T T\n0.25 0.25 0.25 F F F\n";
        let frame = PoscarFormat::parse(content).unwrap();
        assert_eq!(frame.symbols(), vec!["Si", "Si"]);
        assert_eq!(frame.unit_cell.vector(1), [0.0, 2.0, 0.0]);
        assert_eq!(frame.positions()[1], [0.5, 0.5, 0.5]);
    }

    #[test]
    fn cartesian_scaled_per_axis() {
        let content = "Cu\n1.0 2.0 3.0\n1 0 0\n0 1 0\n0 0 1\nCu\n1\nCartesian\n0.5 0.5 0.5\n";
        let frame = PoscarFormat::parse(content).unwrap();
        assert_eq!(frame.positions()[0], [0.5, 1.0, 1.5]);
        assert_eq!(frame.unit_cell.vector(2)[2], 3.0);
    }

    #[test]
    fn negative_scale_is_a_volume() {
        let content = "cube\n-8.0\n1 0 0\n0 1 0\n0 0 1\nFe_pv\n1\nDirect\n0.5 0.5 0.5\n";
        let frame = PoscarFormat::parse(content).unwrap();
        assert_eq!(frame.symbols(), vec!["Fe"]);
        assert_approx_eq!(frame.unit_cell.volume(), 8.0, 1e-12);
        assert_approx_eq!(frame.positions()[0][0], 1.0, 1e-12);
    }

    #[test]
    fn vasp4_comment_must_name_elements() {
        let content = "cubic cell\n1.0\n1 0 0\n0 1 0\n0 0 1\n1\nDirect\n0 0 0\n";
        let err = PoscarFormat::parse(content).unwrap_err();
        assert!(err.to_string().contains("unknown element 'cubic'"), "{err}");
    }

    #[test]
    fn truncated_file() {
        let content = "cube\n1.0\n1 0 0\n0 1 0\n0 0 1\nFe\n2\nDirect\n0 0 0\n";
        let err = PoscarFormat::parse(content).unwrap_err();
        assert!(err.to_string().contains("atomic positions"), "{err}");
    }
}
