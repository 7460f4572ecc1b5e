// SPDX-License-Identifier: BSD-3-Clause
//
// See LICENSE at the project root for full text.

//! ASE binary trajectories (`.traj`), stored in the ULM container.
//!
//! ```text
//! 0   "- of Ulm"               magic
//! 8   tag, 16 bytes            "ASE-Trajectory" padded with spaces
//! 24  version                  i64
//! 32  nitems                   i64
//! 40  offset table position    i64
//! ..  array data and item headers
//! pos offset table             nitems x i64, one per frame
//! ```
//!
//! Each table entry points at an `i64` length followed by a JSON header.
//! Arrays in the header are references `{"ndarray": [shape, dtype, offset]}`
//! to raw little-endian data elsewhere in the file.

use crate::atom::Atom;
use crate::elements;
use crate::error::TrajError;
use crate::format::FileFormat;
use crate::frame::Frame;
use crate::property::{Properties, Property};
use crate::unit_cell::UnitCell;
use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use nalgebra::Matrix3;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom};

const FORMAT: &str = "ASE trajectory";
const MAGIC: &[u8; 8] = b"- of Ulm";
const TAG: &str = "ASE-Trajectory";

fn format_error(details: impl Into<String>) -> TrajError {
    TrajError::format(FORMAT, details)
}

#[derive(Default)]
pub struct TrajFormat {
    offsets: Option<Vec<u64>>,
    next: usize,
    /// `numbers` and `pbc` are only stored when they change
    numbers: Option<Vec<i64>>,
    pbc: [bool; 3],
}

/// A binary array referenced from an item header.
struct NdArray {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl TrajFormat {
    fn offsets(&mut self, reader: &mut BufReader<File>) -> Result<&[u64], TrajError> {
        if self.offsets.is_none() {
            self.offsets = Some(Self::read_header(reader)?);
        }
        Ok(self.offsets.as_deref().unwrap_or_default())
    }

    fn read_header(reader: &mut BufReader<File>) -> Result<Vec<u64>, TrajError> {
        reader.seek(SeekFrom::Start(0))?;
        let mut magic = [0; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(format_error("missing `- of Ulm` signature"));
        }

        let mut tag = [0; 16];
        reader.read_exact(&mut tag)?;
        let tag = String::from_utf8_lossy(&tag);
        if tag.trim_end() != TAG {
            return Err(format_error(format!(
                "expected a `{TAG}` file, found `{}`",
                tag.trim_end()
            )));
        }

        let version = reader.read_i64::<LittleEndian>()?;
        let nitems = reader.read_i64::<LittleEndian>()?;
        let table = reader.read_i64::<LittleEndian>()?;
        debug!("ULM version {version} with {nitems} items");

        let nitems = usize::try_from(nitems)
            .map_err(|_| format_error(format!("negative item count {nitems}")))?;
        let table = u64::try_from(table)
            .map_err(|_| format_error(format!("negative offset table position {table}")))?;

        reader.seek(SeekFrom::Start(table))?;
        (0..nitems)
            .map(|_| {
                let offset = reader.read_i64::<LittleEndian>()?;
                u64::try_from(offset)
                    .map_err(|_| format_error(format!("invalid item offset {offset}")))
            })
            .collect()
    }

    fn read_item(reader: &mut BufReader<File>, offset: u64) -> Result<Map<String, Value>, TrajError> {
        reader.seek(SeekFrom::Start(offset))?;
        let size = reader.read_i64::<LittleEndian>()?;
        let size = usize::try_from(size)
            .map_err(|_| format_error(format!("invalid header size {size}")))?;
        let mut json = vec![0; size];
        reader.read_exact(&mut json)?;

        match serde_json::from_slice::<Value>(&json)? {
            Value::Object(map) => Ok(strip_child_markers(map)),
            _ => Err(format_error("item header is not a JSON object")),
        }
    }

    fn read_array(reader: &mut BufReader<File>, value: &Value) -> Result<NdArray, TrajError> {
        if let Some(reference) = value.get("ndarray") {
            let (shape, dtype, offset) = match reference.as_array().map(Vec::as_slice) {
                Some([shape, dtype, offset]) => (shape, dtype, offset),
                _ => return Err(format_error(format!("malformed ndarray reference {reference}"))),
            };
            let shape = parse_shape(shape)?;
            let offset = offset
                .as_u64()
                .ok_or_else(|| format_error(format!("invalid array offset {offset}")))?;
            let count = shape.iter().product();

            reader.seek(SeekFrom::Start(offset))?;
            let values = match dtype.as_str() {
                Some("float64") => {
                    let mut values = vec![0.0; count];
                    reader.read_f64_into::<LittleEndian>(&mut values)?;
                    values
                }
                Some("float32") => (0..count)
                    .map(|_| reader.read_f32::<LittleEndian>().map(f64::from))
                    .collect::<Result<_, _>>()?,
                Some("int64") => (0..count)
                    .map(|_| reader.read_i64::<LittleEndian>().map(|x| x as f64))
                    .collect::<Result<_, _>>()?,
                Some("int32") => (0..count)
                    .map(|_| reader.read_i32::<LittleEndian>().map(f64::from))
                    .collect::<Result<_, _>>()?,
                Some("bool") => (0..count)
                    .map(|_| reader.read_u8().map(f64::from))
                    .collect::<Result<_, _>>()?,
                other => return Err(format_error(format!("unsupported dtype {other:?}"))),
            };
            return Ok(NdArray { shape, values });
        }

        // inline arrays: nested lists or ASE's `{"__ndarray__": [shape, dtype, data]}`
        if let Some([shape, _, data]) = value
            .get("__ndarray__")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
        {
            let shape = parse_shape(shape)?;
            return Ok(NdArray {
                shape,
                values: flatten_numbers(data)?,
            });
        }
        let mut shape = Vec::new();
        let mut level = value;
        while let Some(inner) = level.as_array() {
            shape.push(inner.len());
            match inner.first() {
                Some(first) => level = first,
                None => break,
            }
        }
        Ok(NdArray {
            shape,
            values: flatten_numbers(value)?,
        })
    }

    fn build_frame(
        &mut self,
        reader: &mut BufReader<File>,
        item: &Map<String, Value>,
    ) -> Result<Frame, TrajError> {
        if let Some(numbers) = item.get("numbers") {
            let numbers = Self::read_array(reader, numbers)?;
            self.numbers = Some(numbers.values.iter().map(|&x| x as i64).collect());
        }
        if let Some(pbc) = item.get("pbc") {
            let flags = Self::read_array(reader, pbc)?.values;
            match flags[..] {
                [a, b, c] => self.pbc = [a != 0.0, b != 0.0, c != 0.0],
                _ => return Err(format_error(format!("pbc needs 3 flags, got {}", flags.len()))),
            }
        }

        let numbers = self
            .numbers
            .as_ref()
            .ok_or_else(|| format_error("first frame has no atomic numbers"))?;
        let positions = item
            .get("positions")
            .ok_or_else(|| format_error(format!("frame {} has no positions", self.next)))?;
        let positions = Self::read_array(reader, positions)?;
        if positions.values.len() != 3 * numbers.len() {
            return Err(format_error(format!(
                "{} positions for {} atoms",
                positions.values.len() / 3,
                numbers.len()
            )));
        }

        let mut frame = Frame::with_capacity(numbers.len());
        for (&number, xyz) in numbers.iter().zip(positions.values.chunks_exact(3)) {
            let symbol = elements::symbol(number)
                .ok_or_else(|| format_error(format!("unknown atomic number {number}")))?;
            frame.add_atom(Atom::new(symbol, [xyz[0], xyz[1], xyz[2]]));
        }
        frame.pbc = self.pbc;

        if let Some(cell) = item.get("cell") {
            let cell = Self::read_array(reader, cell)?.values;
            if cell.len() != 9 {
                return Err(format_error(format!("cell needs 9 numbers, got {}", cell.len())));
            }
            frame.unit_cell = UnitCell {
                cell_matrix: Matrix3::from_row_slice(&cell),
            };
        }

        if let Some(Value::Object(info)) = item.get("info") {
            frame.properties = Properties::from_json(info);
        }

        if let Some(Value::Object(calculator)) = item.get("calculator") {
            let calculator = strip_child_markers(calculator.clone());
            Self::read_results(reader, &calculator, &mut frame)?;
        }

        Ok(frame)
    }

    /// Copies calculator results (energy, forces, stress) into `frame`.
    fn read_results(
        reader: &mut BufReader<File>,
        calculator: &Map<String, Value>,
        frame: &mut Frame,
    ) -> Result<(), TrajError> {
        for key in ["energy", "free_energy"] {
            if let Some(energy) = calculator.get(key).and_then(Value::as_f64) {
                frame
                    .properties
                    .insert(key.to_string(), Property::Double(energy));
            }
        }

        if let Some(forces) = calculator.get("forces") {
            let forces = Self::read_array(reader, forces)?;
            if forces.values.len() != 3 * frame.size() {
                return Err(format_error(format!(
                    "forces of shape {:?} for {} atoms",
                    forces.shape,
                    frame.size()
                )));
            }
            let forces = forces
                .values
                .chunks_exact(3)
                .map(|f| Property::Vector3D([f[0], f[1], f[2]]))
                .collect();
            frame.set_array("forces", forces)?;
        }

        if let Some(stress) = calculator.get("stress") {
            let stress = Self::read_array(reader, stress)?.values;
            let matrix = match stress[..] {
                [xx, yy, zz, yz, xz, xy] => {
                    Matrix3::new(xx, xy, xz, xy, yy, yz, xz, yz, zz)
                }
                _ if stress.len() == 9 => Matrix3::from_row_slice(&stress),
                _ => return Err(format_error(format!("stress with {} components", stress.len()))),
            };
            frame
                .properties
                .insert("stress".to_string(), Property::Matrix3x3(matrix));
        }
        Ok(())
    }
}

/// Child writers and arrays are stored under keys with a trailing `.`.
fn strip_child_markers(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| match key.strip_suffix('.') {
            Some(name) => (name.to_string(), value),
            None => (key, value),
        })
        .collect()
}

fn parse_shape(shape: &Value) -> Result<Vec<usize>, TrajError> {
    shape
        .as_array()
        .ok_or_else(|| format_error(format!("invalid array shape {shape}")))?
        .iter()
        .map(|d| {
            d.as_u64()
                .map(|d| d as usize)
                .ok_or_else(|| format_error(format!("invalid array dimension {d}")))
        })
        .collect()
}

fn flatten_numbers(value: &Value) -> Result<Vec<f64>, TrajError> {
    let mut values = Vec::new();
    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        match value {
            Value::Array(items) => stack.extend(items.iter().rev()),
            Value::Bool(b) => values.push(f64::from(u8::from(*b))),
            Value::Number(n) => values.push(
                n.as_f64()
                    .ok_or_else(|| format_error(format!("invalid number {n}")))?,
            ),
            other => return Err(format_error(format!("expected numbers, found {other}"))),
        }
    }
    Ok(values)
}

/// Scalars, strings and short numeric lists of `info`; anything else is skipped.
fn json_to_property(value: &Value) -> Option<Property> {
    match value {
        Value::Bool(b) => Some(Property::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(Property::Int)
            .or_else(|| n.as_f64().map(Property::Double)),
        Value::String(s) => Some(Property::String(s.clone())),
        Value::Array(_) => {
            let values = flatten_numbers(value).ok()?;
            match values[..] {
                [x, y, z] => Some(Property::Vector3D([x, y, z])),
                _ if values.len() == 9 => Some(Property::Matrix3x3(Matrix3::from_row_slice(&values))),
                _ => Some(Property::VectorXD(values)),
            }
        }
        _ => None,
    }
}

impl FileFormat for TrajFormat {
    fn read_next(&mut self, reader: &mut BufReader<File>) -> Result<Frame, TrajError> {
        self.read(reader)?
            .ok_or_else(|| format_error(format!("no frame {} in trajectory", self.next)))
    }

    fn read(&mut self, reader: &mut BufReader<File>) -> Result<Option<Frame>, TrajError> {
        let next = self.next;
        let offset = match self.offsets(reader)?.get(next) {
            Some(&offset) => offset,
            None => return Ok(None),
        };
        let item = Self::read_item(reader, offset)?;
        let frame = self.build_frame(reader, &item)?;
        self.next += 1;
        Ok(Some(frame))
    }

    fn write_next(&mut self, _writer: &mut BufWriter<File>, _frame: &Frame) -> Result<(), TrajError> {
        Err(TrajError::UnsupportedFormat(
            "writing ASE trajectories".to_string(),
        ))
    }

    fn forward(&mut self, reader: &mut BufReader<File>) -> Result<Option<u64>, TrajError> {
        let next = self.next;
        let offset = self.offsets(reader)?.get(next).copied();
        if offset.is_some() {
            self.next += 1;
        }
        Ok(offset)
    }
}

impl Properties {
    /// Builds frame info from the JSON object of an ASE trajectory item.
    pub fn from_json(info: &Map<String, Value>) -> Self {
        info.iter()
            .filter_map(|(key, value)| json_to_property(value).map(|p| (key.clone(), p)))
            .collect()
    }
}
