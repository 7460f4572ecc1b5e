// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use crate::atom::Atom;
use crate::error::TrajError;
use crate::extendedxyzparser::ExtendedXyzParser;
use crate::format::FileFormat;
use crate::frame::Frame;
use crate::property::{Property, PropertyKind};
use crate::unit_cell::UnitCell;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, Write};
use std::str::SplitWhitespace;

const FORMAT: &str = "XYZ";
const DEFAULT_PROPERTIES: &str = "species:S:1:pos:R:3";

/// Plain and extended XYZ.
///
/// Reading always understands the extended comment line, so plain files and
/// CP2K's `i = .., time = .., E = ..` comments go through the same path. The
/// `extended` flag only changes what gets written.
pub struct XYZFormat {
    extended: bool,
}

/// One column group of the `Properties=` definition.
#[derive(Debug, Clone, PartialEq)]
enum Column {
    Species,
    Position,
    Property {
        name: String,
        kind: PropertyKind,
        count: usize,
    },
}

impl XYZFormat {
    pub fn plain() -> Self {
        XYZFormat { extended: false }
    }

    pub fn extended() -> Self {
        XYZFormat { extended: true }
    }

    fn parse_property_list(line: &str) -> Result<Vec<Column>, TrajError> {
        let fields: Vec<&str> = line.split(':').collect();

        if fields.len() % 3 != 0 {
            return Err(TrajError::format(
                FORMAT,
                "Invalid property list format: property definitions must be in groups of 3 (name:type:count)",
            ));
        }

        let mut columns = Vec::with_capacity(fields.len() / 3);
        for chunk in fields.chunks_exact(3) {
            let name = chunk[0];
            let count = chunk[2].parse::<usize>().map_err(|e| {
                TrajError::format(
                    FORMAT,
                    format!("Invalid property count '{}': {e}", chunk[2]),
                )
            })?;
            if count == 0 {
                return Err(TrajError::format(
                    FORMAT,
                    format!("Invalid count of 0 for property '{name}'"),
                ));
            }

            let kind = match chunk[1] {
                "R" => PropertyKind::Double,
                "I" => PropertyKind::Int,
                "S" => PropertyKind::String,
                "L" => PropertyKind::Bool,
                unknown => {
                    return Err(TrajError::format(
                        FORMAT,
                        format!("Unknown property type: {unknown}"),
                    ));
                }
            };

            let column = match (name, kind, count) {
                ("species", PropertyKind::String, 1) => Column::Species,
                ("pos", PropertyKind::Double, 3) => Column::Position,
                _ => Column::Property {
                    name: name.to_string(),
                    kind,
                    count,
                },
            };
            columns.push(column);
        }

        if !columns.contains(&Column::Species) || !columns.contains(&Column::Position) {
            return Err(TrajError::format(
                FORMAT,
                format!("Properties must define species:S:1 and pos:R:3, got '{line}'"),
            ));
        }

        Ok(columns)
    }

    /// Fills cell, pbc and info of `frame` from the comment line and returns
    /// the column layout of the atom lines.
    fn read_comment_line(line: &str, frame: &mut Frame) -> Result<Vec<Column>, TrajError> {
        let line = line.trim();
        if !line.contains('=') {
            if !line.is_empty() {
                frame
                    .properties
                    .insert("comment".to_string(), Property::String(line.to_string()));
            }
            return Self::parse_property_list(DEFAULT_PROPERTIES);
        }

        let mut columns = None;
        let mut pbc = None;
        for (key, value) in ExtendedXyzParser::new(line).parse() {
            match key.as_str() {
                "Lattice" => frame.unit_cell = UnitCell::parse(&value)?,
                "Properties" => columns = Some(Self::parse_property_list(&value)?),
                "pbc" => {
                    let flags = value
                        .split_whitespace()
                        .map(|v| Property::parse_value(v, PropertyKind::Bool).map(|p| p.expect_bool()))
                        .collect::<Result<Vec<_>, _>>()?;
                    match flags[..] {
                        [a, b, c] => pbc = Some([a, b, c]),
                        _ => {
                            return Err(TrajError::format(
                                FORMAT,
                                format!("pbc needs 3 flags, got '{value}'"),
                            ))
                        }
                    }
                }
                _ => {
                    frame.properties.insert(key, Property::infer(&value));
                }
            }
        }

        frame.pbc = match pbc {
            Some(flags) => flags,
            None => [!frame.unit_cell.is_infinite(); 3],
        };

        match columns {
            Some(columns) => Ok(columns),
            None => Self::parse_property_list(DEFAULT_PROPERTIES),
        }
    }

    fn read_atom(columns: &[Column], tokens: &mut SplitWhitespace) -> Result<Atom, TrajError> {
        let mut atom = Atom::default();
        for column in columns {
            match column {
                Column::Species => {
                    atom.symbol = tokens.next().ok_or(TrajError::MissingToken)?.to_string();
                }
                Column::Position => {
                    for x in atom.position.iter_mut() {
                        *x = tokens.next().ok_or(TrajError::MissingToken)?.parse()?;
                    }
                }
                Column::Property { name, kind, count } => {
                    Self::read_atomic_property(name, *kind, *count, tokens, &mut atom)?;
                }
            }
        }
        Ok(atom)
    }

    fn read_atomic_property(
        name: &str,
        kind: PropertyKind,
        count: usize,
        tokens: &mut SplitWhitespace,
        atom: &mut Atom,
    ) -> Result<(), TrajError> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(tokens.next().ok_or(TrajError::MissingToken)?);
        }

        match (kind, count) {
            (_, 1) => {
                let property = Property::parse_value(values[0], kind)?;
                atom.properties.insert(name.to_string(), property);
            }
            (PropertyKind::Double, 3) => {
                let property = Property::parse_value(&values.join(" "), PropertyKind::Vector3D)?;
                atom.properties.insert(name.to_string(), property);
            }
            (PropertyKind::Double | PropertyKind::Int, _) => {
                let property = Property::parse_value(&values.join(" "), PropertyKind::VectorXD)?;
                atom.properties.insert(name.to_string(), property);
            }
            _ => {
                for (i, value) in values.into_iter().enumerate() {
                    let property = Property::parse_value(value, kind)?;
                    atom.properties.insert(format!("{name}_{i}"), property);
                }
            }
        }
        Ok(())
    }

    /// Reads the next non-blank line into `line`, returning `false` at end of file.
    fn next_non_blank(reader: &mut BufReader<File>, line: &mut String) -> Result<bool, TrajError> {
        loop {
            line.clear();
            if reader.read_line(line)? == 0 {
                return Ok(false);
            }
            if !line.trim().is_empty() {
                return Ok(true);
            }
        }
    }

    fn parse_natoms(line: &str) -> Result<usize, TrajError> {
        line.trim().parse::<usize>().map_err(|_| {
            TrajError::format(
                FORMAT,
                format!("expected the number of atoms, got '{}'", line.trim()),
            )
        })
    }

    fn read_frame(reader: &mut BufReader<File>, count_line: &str) -> Result<Frame, TrajError> {
        let n_atoms = Self::parse_natoms(count_line)?;

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(TrajError::UnexpectedEof {
                format: FORMAT.to_string(),
                step: 0,
                expected: n_atoms + 2,
                got: 1,
            });
        }
        let mut frame = Frame::with_capacity(n_atoms);
        let columns = Self::read_comment_line(&line, &mut frame)?;

        for i in 0..n_atoms {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(TrajError::UnexpectedEof {
                    format: FORMAT.to_string(),
                    step: 0,
                    expected: n_atoms + 2,
                    got: i + 2,
                });
            }
            let mut tokens = line.split_whitespace();
            frame.add_atom(Self::read_atom(&columns, &mut tokens)?);
        }

        Ok(frame)
    }

    fn format_value(key: &str, property: &Property) -> Result<String, TrajError> {
        let value = match property {
            Property::Bool(b) => flag(*b).to_string(),
            Property::Int(i) => i.to_string(),
            Property::Double(d) => format!("{d:?}"),
            Property::String(s) => quote_string(key, s)?,
            Property::Vector3D(v) => quoted(v.iter().copied()),
            Property::Matrix3x3(m) => quoted(m.transpose().iter().copied()),
            Property::VectorXD(v) => quoted(v.iter().copied()),
        };
        Ok(value)
    }

    fn column_definition(name: &str, property: &Property) -> String {
        let (kind, count) = match property {
            Property::Bool(_) => ("L", 1),
            Property::Int(_) => ("I", 1),
            Property::Double(_) => ("R", 1),
            Property::String(_) => ("S", 1),
            Property::Vector3D(_) => ("R", 3),
            Property::Matrix3x3(_) => ("R", 9),
            Property::VectorXD(v) => ("R", v.len()),
        };
        format!("{name}:{kind}:{count}")
    }

    fn write_atomic_value(out: &mut String, name: &str, property: &Property) -> Result<(), TrajError> {
        let _ = match property {
            Property::Bool(b) => write!(out, " {}", flag(*b)),
            Property::Int(i) => write!(out, " {i:8}"),
            Property::Double(d) => write!(out, " {d:16.8}"),
            // atom lines are split on whitespace, quotes are not understood there
            Property::String(s) if s.is_empty() || s.contains(char::is_whitespace) => {
                return Err(TrajError::InvalidArgument(format!(
                    "per-atom string `{name}` cannot be written as a column: {s:?}"
                )))
            }
            Property::String(s) => write!(out, " {s}"),
            Property::Vector3D(v) => v.iter().try_for_each(|x| write!(out, " {x:16.8}")),
            Property::Matrix3x3(m) => m.transpose().iter().try_for_each(|x| write!(out, " {x:16.8}")),
            Property::VectorXD(v) => v.iter().try_for_each(|x| write!(out, " {x:16.8}")),
        };
        Ok(())
    }

    fn write_extended(writer: &mut BufWriter<File>, frame: &Frame) -> Result<(), TrajError> {
        let names: Vec<String> = frame.array_names().into_iter().collect();

        let mut comment = String::new();
        if !frame.unit_cell.is_infinite() {
            let m = frame.unit_cell.cell_matrix;
            let lattice: Vec<String> = (0..3)
                .flat_map(|i| (0..3).map(move |j| m[(i, j)].to_string()))
                .collect();
            comment.push_str(&format!("Lattice=\"{}\" ", lattice.join(" ")));
        }

        comment.push_str("Properties=");
        comment.push_str(DEFAULT_PROPERTIES);
        if let Some(first) = frame.atoms().first() {
            for name in &names {
                comment.push(':');
                comment.push_str(&Self::column_definition(name, &first.properties[name]));
            }
        }

        for (key, value) in &frame.properties {
            comment.push_str(&format!(" {key}={}", Self::format_value(key, value)?));
        }

        let pbc = frame.pbc.map(flag).join(" ");
        comment.push_str(&format!(" pbc=\"{pbc}\""));

        writeln!(writer, "{}", frame.size())?;
        writeln!(writer, "{comment}")?;

        let mut line = String::new();
        for (index, atom) in frame.atoms().iter().enumerate() {
            line.clear();
            let [x, y, z] = atom.position;
            let _ = write!(line, "{:<2} {x:16.8} {y:16.8} {z:16.8}", atom.symbol);
            for name in &names {
                let value = atom.properties.get(name).ok_or_else(|| {
                    TrajError::Precondition(format!("atom {index} has no value for array `{name}`"))
                })?;
                Self::write_atomic_value(&mut line, name, value)?;
            }
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }

    fn write_plain(writer: &mut BufWriter<File>, frame: &Frame) -> Result<(), TrajError> {
        writeln!(writer, "{}", frame.size())?;
        writeln!(writer)?;
        for atom in frame.atoms() {
            let [x, y, z] = atom.position;
            writeln!(writer, "{:<2} {x:22.15} {y:22.15} {z:22.15}", atom.symbol)?;
        }
        Ok(())
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "T"
    } else {
        "F"
    }
}

/// Space separated numbers in double quotes, for vector and matrix info values.
/// Quotes an info string when the comment-line parser would otherwise split
/// it. Values holding both quote characters or a line break are refused.
fn quote_string(key: &str, value: &str) -> Result<String, TrajError> {
    let special = |c: char| c.is_whitespace() || matches!(c, '=' | ',' | '"' | '\'');
    if !value.is_empty() && !value.contains(special) {
        return Ok(value.to_string());
    }
    if value.contains(['\n', '\r']) {
        return Err(TrajError::InvalidArgument(format!(
            "info `{key}` spans several lines: {value:?}"
        )));
    }
    match (value.contains('"'), value.contains('\'')) {
        (false, _) => Ok(format!("\"{value}\"")),
        (true, false) => Ok(format!("'{value}'")),
        (true, true) => Err(TrajError::InvalidArgument(format!(
            "info `{key}` mixes both quote characters: {value:?}"
        ))),
    }
}

fn quoted(values: impl Iterator<Item = f64>) -> String {
    let joined: Vec<String> = values.map(|v| v.to_string()).collect();
    format!("\"{}\"", joined.join(" "))
}

impl FileFormat for XYZFormat {
    fn read_next(&mut self, reader: &mut BufReader<File>) -> Result<Frame, TrajError> {
        let mut line = String::new();
        if !Self::next_non_blank(reader, &mut line)? {
            return Err(TrajError::UnexpectedEof {
                format: FORMAT.to_string(),
                step: 0,
                expected: 1,
                got: 0,
            });
        }
        Self::read_frame(reader, &line)
    }

    fn read(&mut self, reader: &mut BufReader<File>) -> Result<Option<Frame>, TrajError> {
        let mut line = String::new();
        if Self::next_non_blank(reader, &mut line)? {
            Self::read_frame(reader, &line).map(Some)
        } else {
            Ok(None)
        }
    }

    fn write_next(&mut self, writer: &mut BufWriter<File>, frame: &Frame) -> Result<(), TrajError> {
        if self.extended {
            Self::write_extended(writer, frame)
        } else {
            Self::write_plain(writer, frame)
        }
    }

    fn forward(&mut self, reader: &mut BufReader<File>) -> Result<Option<u64>, TrajError> {
        let mut line = String::new();
        if !Self::next_non_blank(reader, &mut line)? {
            return Ok(None);
        }
        let n_atoms = Self::parse_natoms(&line)?;

        for i in 0..=n_atoms {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(TrajError::UnexpectedEof {
                    format: FORMAT.to_string(),
                    step: 0,
                    expected: n_atoms + 2,
                    got: i + 1,
                });
            }
        }
        Ok(Some(reader.stream_position()?))
    }
}
