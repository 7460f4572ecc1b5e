// SPDX-License-Identifier: BSD-3-Clause
//
// See LICENSE at the project root for full text.

use crate::atom::Atom;
use crate::error::TrajError;
use crate::format::FileFormat;
use crate::frame::Frame;
use crate::property::Property;
use crate::unit_cell::UnitCell;
use crate::units::{BOHR, RYDBERG};
use log::debug;
use nalgebra::Matrix3;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};

const FORMAT: &str = "Quantum ESPRESSO output";

/// Reader for `pw.x` text output. Every converged SCF cycle (`!    total
/// energy`) becomes one frame, carrying the structure it was computed for and
/// the forces and stress printed after it.
///
/// The output is not split into self-contained records, so the whole file is
/// parsed on the first read and frames are handed out from a queue.
#[derive(Default)]
pub struct EspressoFormat {
    frames: Option<VecDeque<Frame>>,
}

fn format_error(details: impl Into<String>) -> TrajError {
    TrajError::format(FORMAT, details)
}

/// Numbers of a `name = ( x y z )` style line, e.g. `a(1) = ( 1.0 0.0 0.0 )`.
fn parenthesized_vector(line: &str) -> Result<[f64; 3], TrajError> {
    let inside = line
        .rsplit_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(inside, _)| inside)
        .ok_or_else(|| format_error(format!("expected `( x y z )` in '{}'", line.trim())))?;
    first_three(inside)
}

fn first_three(text: &str) -> Result<[f64; 3], TrajError> {
    let mut tokens = text.split_whitespace();
    let mut vector = [0.0; 3];
    for x in vector.iter_mut() {
        *x = tokens.next().ok_or(TrajError::MissingToken)?.parse()?;
    }
    Ok(vector)
}

/// First number after the `=` of a `label = value unit` line.
fn value_after_equals(line: &str) -> Result<f64, TrajError> {
    line.split_once('=')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .ok_or_else(|| format_error(format!("expected `= value` in '{}'", line.trim())))?
        .parse()
        .map_err(TrajError::from)
}

/// `Fe1`, `O_h` and `si` all name an element by their leading letters.
fn label_to_symbol(label: &str) -> String {
    let letters: String = label.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let mut chars = letters.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => label.to_string(),
    }
}

/// Units of a card header such as `ATOMIC_POSITIONS (angstrom)` or
/// `CELL_PARAMETERS (alat= 10.2)`.
fn card_units(line: &str) -> String {
    line.split_whitespace()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c| matches!(c, '(' | ')' | '{' | '}'))
        .to_lowercase()
}

#[derive(Default)]
struct Parser<'a> {
    lines: Vec<&'a str>,
    cursor: usize,
    /// `alat` in Å
    alat: f64,
    natoms: usize,
    cell: Option<UnitCell>,
    symbols: Vec<String>,
    positions: Vec<[f64; 3]>,
    frames: Vec<Frame>,
}

impl<'a> Parser<'a> {
    fn new(content: &'a str) -> Self {
        Parser {
            lines: content.lines().collect(),
            ..Parser::default()
        }
    }

    fn next_line(&mut self, what: &str) -> Result<&'a str, TrajError> {
        let line = self
            .lines
            .get(self.cursor)
            .copied()
            .ok_or_else(|| format_error(format!("file ended while reading {what}")))?;
        self.cursor += 1;
        Ok(line)
    }

    fn parse(mut self) -> Result<Vec<Frame>, TrajError> {
        while self.cursor < self.lines.len() {
            let line = self.lines[self.cursor];
            self.cursor += 1;
            let trimmed = line.trim_start();

            if line.contains("lattice parameter (alat)") {
                self.alat = value_after_equals(line)? * BOHR;
            } else if line.contains("number of atoms/cell") {
                self.natoms = value_after_equals(line)? as usize;
            } else if line.contains("crystal axes: (cart. coord. in units of alat)") {
                self.read_crystal_axes()?;
            } else if line.contains("site n.") && line.contains("positions (alat units)") {
                self.read_tau_block()?;
            } else if trimmed.starts_with("CELL_PARAMETERS") {
                self.read_cell_parameters(trimmed)?;
            } else if trimmed.starts_with("ATOMIC_POSITIONS") {
                self.read_atomic_positions(trimmed)?;
            } else if trimmed.starts_with('!') && line.contains("total energy") {
                self.push_frame(value_after_equals(line)? * RYDBERG)?;
            } else if line.contains("Forces acting on atoms") {
                self.read_forces()?;
            } else if line.contains("total   stress") {
                self.read_stress()?;
            }
        }
        Ok(self.frames)
    }

    fn read_crystal_axes(&mut self) -> Result<(), TrajError> {
        let mut vectors = [[0.0; 3]; 3];
        for vector in vectors.iter_mut() {
            *vector = parenthesized_vector(self.next_line("crystal axes")?)?.map(|x| x * self.alat);
        }
        self.cell = Some(UnitCell::from_vectors(vectors[0], vectors[1], vectors[2]));
        Ok(())
    }

    fn read_tau_block(&mut self) -> Result<(), TrajError> {
        self.symbols.clear();
        self.positions.clear();
        for _ in 0..self.natoms {
            let line = self.next_line("initial positions")?;
            let label = line.split_whitespace().nth(1).ok_or(TrajError::MissingToken)?;
            self.symbols.push(label_to_symbol(label));
            self.positions
                .push(parenthesized_vector(line)?.map(|x| x * self.alat));
        }
        Ok(())
    }

    fn read_cell_parameters(&mut self, header: &str) -> Result<(), TrajError> {
        let units = card_units(header);
        let scale = if units.starts_with("alat") {
            match units.split_once('=') {
                Some((_, value)) => value.trim().parse::<f64>()? * BOHR,
                None => self.alat,
            }
        } else if units.starts_with("bohr") {
            BOHR
        } else {
            1.0
        };

        let mut vectors = [[0.0; 3]; 3];
        for vector in vectors.iter_mut() {
            *vector = first_three(self.next_line("CELL_PARAMETERS")?)?.map(|x| x * scale);
        }
        self.cell = Some(UnitCell::from_vectors(vectors[0], vectors[1], vectors[2]));
        Ok(())
    }

    fn read_atomic_positions(&mut self, header: &str) -> Result<(), TrajError> {
        let units = card_units(header);
        let cell = self.cell.clone();

        self.symbols.clear();
        self.positions.clear();
        for _ in 0..self.natoms {
            let line = self.next_line("ATOMIC_POSITIONS")?;
            let (label, rest) = line
                .trim_start()
                .split_once(char::is_whitespace)
                .ok_or(TrajError::MissingToken)?;
            let coordinates = first_three(rest)?;
            let position = match units.as_str() {
                "bohr" => coordinates.map(|x| x * BOHR),
                "alat" => coordinates.map(|x| x * self.alat),
                "crystal" => cell
                    .as_ref()
                    .ok_or_else(|| format_error("crystal coordinates before any cell"))?
                    .cartesian(coordinates),
                _ => coordinates,
            };
            self.symbols.push(label_to_symbol(label));
            self.positions.push(position);
        }
        Ok(())
    }

    fn push_frame(&mut self, energy: f64) -> Result<(), TrajError> {
        let cell = self
            .cell
            .clone()
            .ok_or_else(|| format_error("total energy printed before the cell"))?;
        if self.positions.is_empty() {
            return Err(format_error("total energy printed before the positions"));
        }

        let mut frame = Frame::with_capacity(self.positions.len());
        for (symbol, &position) in self.symbols.iter().zip(&self.positions) {
            frame.add_atom(Atom::new(symbol.as_str(), position));
        }
        frame.unit_cell = cell;
        frame.pbc = [true; 3];
        frame
            .properties
            .insert("energy".to_string(), Property::Double(energy));
        frame
            .properties
            .insert("free_energy".to_string(), Property::Double(energy));

        debug!("image {} with energy {energy} eV", self.frames.len());
        self.frames.push(frame);
        Ok(())
    }

    fn read_forces(&mut self) -> Result<(), TrajError> {
        let mut forces = Vec::with_capacity(self.natoms);
        while forces.len() < self.natoms {
            let line = self.next_line("forces")?;
            if line.trim_start().starts_with("atom") && line.contains("force =") {
                let (_, values) = line.split_once("force =").ok_or(TrajError::MissingToken)?;
                let force = first_three(values)?.map(|x| x * RYDBERG / BOHR);
                forces.push(Property::Vector3D(force));
            } else if !line.trim().is_empty() {
                return Err(format_error(format!(
                    "expected {} force lines, found '{}'",
                    self.natoms,
                    line.trim()
                )));
            }
        }

        if let Some(frame) = self.frames.last_mut() {
            frame.set_array("forces", forces)?;
        }
        Ok(())
    }

    fn read_stress(&mut self) -> Result<(), TrajError> {
        let mut rows = Vec::with_capacity(9);
        for _ in 0..3 {
            let row = first_three(self.next_line("stress")?)?;
            rows.extend(row.map(|x| -x * RYDBERG / BOHR.powi(3)));
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.properties.insert(
                "stress".to_string(),
                Property::Matrix3x3(Matrix3::from_row_slice(&rows)),
            );
        }
        Ok(())
    }
}

impl EspressoFormat {
    pub fn parse(content: &str) -> Result<Vec<Frame>, TrajError> {
        Parser::new(content).parse()
    }

    fn frames(&mut self, reader: &mut BufReader<File>) -> Result<&mut VecDeque<Frame>, TrajError> {
        if self.frames.is_none() {
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            self.frames = Some(Self::parse(&content)?.into());
        }
        Ok(self.frames.get_or_insert_with(VecDeque::new))
    }
}

impl FileFormat for EspressoFormat {
    fn read_next(&mut self, reader: &mut BufReader<File>) -> Result<Frame, TrajError> {
        self.frames(reader)?
            .pop_front()
            .ok_or_else(|| format_error("no more completed SCF cycles"))
    }

    fn read(&mut self, reader: &mut BufReader<File>) -> Result<Option<Frame>, TrajError> {
        Ok(self.frames(reader)?.pop_front())
    }

    fn write_next(&mut self, _writer: &mut BufWriter<File>, _frame: &Frame) -> Result<(), TrajError> {
        Err(TrajError::UnsupportedFormat(
            "writing Quantum ESPRESSO output".to_string(),
        ))
    }

    fn forward(&mut self, reader: &mut BufReader<File>) -> Result<Option<u64>, TrajError> {
        let frames = self.frames(reader)?;
        Ok(frames.pop_front().map(|_| frames.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Trajectory;
    use assert_approx_eq::assert_approx_eq;
    use std::path::Path;

    const RELAX: &str = "./src/tests-data/espresso/relax.out";

    #[test]
    fn one_frame_per_scf() {
        let frames = Trajectory::read_all(Path::new(RELAX)).unwrap();
        assert_eq!(frames.len(), 2);

        let first = &frames[0];
        assert_eq!(first.symbols(), vec!["Si", "Si"]);
        assert_eq!(first.pbc, [true; 3]);
        let alat = 10.2 * BOHR;
        assert_approx_eq!(first.unit_cell.vector(0)[0], -0.5 * alat, 1e-9);
        assert_approx_eq!(first.unit_cell.vector(0)[2], 0.5 * alat, 1e-9);
        assert_approx_eq!(first.positions()[1][0], 0.26 * alat, 1e-9);
        assert_approx_eq!(
            first.properties["energy"].expect_double(),
            -15.79441848 * RYDBERG,
            1e-9
        );

        let forces = first.vector_array("forces").unwrap();
        assert_approx_eq!(forces[0][0], -0.00211 * RYDBERG / BOHR, 1e-12);
        assert_approx_eq!(forces[1][0], 0.00211 * RYDBERG / BOHR, 1e-12);

        let stress = first.properties["stress"].expect_matrix3x3();
        assert_approx_eq!(stress[0], 0.00000352 * RYDBERG / BOHR.powi(3), 1e-12);

        let second = &frames[1];
        assert_approx_eq!(second.positions()[1][0], 1.35, 1e-12);
        assert_approx_eq!(
            second.properties["energy"].expect_double(),
            -15.79450301 * RYDBERG,
            1e-9
        );
        assert!(!second.properties.contains_key("stress"));
    }

    #[test]
    fn counting_does_not_disturb_reading() {
        let mut trajectory = Trajectory::open(Path::new(RELAX)).unwrap();
        assert_eq!(trajectory.size().unwrap(), 2);
        let last = trajectory.read_at(1).unwrap();
        assert_approx_eq!(last.positions()[1][0], 1.35, 1e-12);
    }

    #[test]
    fn labels_become_symbols() {
        assert_eq!(label_to_symbol("Fe1"), "Fe");
        assert_eq!(label_to_symbol("si"), "Si");
        assert_eq!(label_to_symbol("O_h"), "O");
    }

    #[test]
    fn energy_before_structure_is_an_error() {
        let err = EspressoFormat::parse("!    total energy              =     -1.0 Ry\n").unwrap_err();
        assert!(err.to_string().contains("before the cell"), "{err}");
    }
}
