// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use crate::error::TrajError;
use crate::formats::espresso::EspressoFormat;
use crate::formats::poscar::PoscarFormat;
use crate::formats::ulm::TrajFormat;
use crate::formats::xyz::XYZFormat;
use crate::frame::Frame;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

/// Supported trajectory file formats for reading and writing.
///
/// - `XYZ`: plain XYZ, written without any metadata.
/// - `ExtXYZ`: extended XYZ, with cell, info and per-atom arrays.
/// - `Poscar`: VASP POSCAR/CONTCAR (read only).
/// - `Espresso`: Quantum ESPRESSO `pw.x` output (read only).
/// - `Traj`: ASE binary trajectory (read only).
/// - `Guess`: autodetect format from file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatKind {
    XYZ,
    ExtXYZ,
    Poscar,
    Espresso,
    Traj,
    Guess,
}

impl FromStr for FormatKind {
    type Err = TrajError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xyz" => Ok(FormatKind::XYZ),
            "extxyz" => Ok(FormatKind::ExtXYZ),
            "poscar" | "vasp" => Ok(FormatKind::Poscar),
            "espresso-out" | "espresso" => Ok(FormatKind::Espresso),
            "traj" => Ok(FormatKind::Traj),
            "guess" => Ok(FormatKind::Guess),
            other => Err(TrajError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::XYZ => "xyz",
            FormatKind::ExtXYZ => "extxyz",
            FormatKind::Poscar => "poscar",
            FormatKind::Espresso => "espresso-out",
            FormatKind::Traj => "traj",
            FormatKind::Guess => "guess",
        };
        f.write_str(name)
    }
}

impl FormatKind {
    /// Detect the format from the extension, or from VASP's fixed file names.
    pub fn guess(path: &Path) -> Result<Self, TrajError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");

        match ext.as_str() {
            "xyz" | "extxyz" => Ok(FormatKind::ExtXYZ),
            "traj" => Ok(FormatKind::Traj),
            "out" | "pwo" => Ok(FormatKind::Espresso),
            "vasp" | "poscar" => Ok(FormatKind::Poscar),
            _ if name.contains("POSCAR") || name.contains("CONTCAR") => Ok(FormatKind::Poscar),
            _ => Err(TrajError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Concrete file format strategy for reading and writing trajectory data.
pub enum Format {
    XYZ(XYZFormat),
    Poscar(PoscarFormat),
    Espresso(EspressoFormat),
    Traj(TrajFormat),
}

impl Format {
    /// Creates a new `Format` using the specified `FormatKind` and file `path`.
    ///
    /// `FormatKind::Guess` looks at the file name of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if guessing cannot detect the format.
    pub fn new(kind: FormatKind, path: &Path) -> Result<Self, TrajError> {
        match kind {
            FormatKind::XYZ => Ok(Format::XYZ(XYZFormat::plain())),
            FormatKind::ExtXYZ => Ok(Format::XYZ(XYZFormat::extended())),
            FormatKind::Poscar => Ok(Format::Poscar(PoscarFormat::default())),
            FormatKind::Espresso => Ok(Format::Espresso(EspressoFormat::default())),
            FormatKind::Traj => Ok(Format::Traj(TrajFormat::default())),
            FormatKind::Guess => Self::new(FormatKind::guess(path)?, path),
        }
    }
}

/// Whether `reader` has more bytes to offer.
pub(crate) fn has_data_left(reader: &mut BufReader<File>) -> Result<bool, TrajError> {
    // TODO: replace with BufRead::has_data_left when stabilized
    Ok(!reader.fill_buf()?.is_empty())
}

/// Common interface for reading and writing trajectory file formats.
pub trait FileFormat {
    /// Reads the next [`Frame`] from `reader`.
    ///
    /// # Errors
    /// Returns an error if reading or parsing the frame fails.
    fn read_next(&mut self, reader: &mut BufReader<File>) -> Result<Frame, TrajError>;

    /// Reads a single [`Frame`], returning `None` at end-of-file.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O or parsing error occurs.
    fn read(&mut self, reader: &mut BufReader<File>) -> Result<Option<Frame>, TrajError> {
        if has_data_left(reader)? {
            self.read_next(reader).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Writes the next [`Frame`] to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the format is read only.
    fn write_next(&mut self, writer: &mut BufWriter<File>, frame: &Frame) -> Result<(), TrajError>;

    /// Skips over the next frame in `reader` without building it, returning
    /// the byte offset where the following frame starts.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O or parsing error occurs.
    fn forward(&mut self, reader: &mut BufReader<File>) -> Result<Option<u64>, TrajError>;

    /// Finalizes the file output, writing any trailing records.
    fn finalize(&mut self, _writer: &mut BufWriter<File>) -> Result<(), TrajError> {
        Ok(())
    }
}

impl FileFormat for Format {
    fn read_next(&mut self, reader: &mut BufReader<File>) -> Result<Frame, TrajError> {
        match self {
            Format::XYZ(format) => format.read_next(reader),
            Format::Poscar(format) => format.read_next(reader),
            Format::Espresso(format) => format.read_next(reader),
            Format::Traj(format) => format.read_next(reader),
        }
    }

    fn read(&mut self, reader: &mut BufReader<File>) -> Result<Option<Frame>, TrajError> {
        match self {
            Format::XYZ(format) => format.read(reader),
            Format::Poscar(format) => format.read(reader),
            Format::Espresso(format) => format.read(reader),
            Format::Traj(format) => format.read(reader),
        }
    }

    fn write_next(&mut self, writer: &mut BufWriter<File>, frame: &Frame) -> Result<(), TrajError> {
        match self {
            Format::XYZ(format) => format.write_next(writer, frame),
            Format::Poscar(format) => format.write_next(writer, frame),
            Format::Espresso(format) => format.write_next(writer, frame),
            Format::Traj(format) => format.write_next(writer, frame),
        }
    }

    fn forward(&mut self, reader: &mut BufReader<File>) -> Result<Option<u64>, TrajError> {
        match self {
            Format::XYZ(format) => format.forward(reader),
            Format::Poscar(format) => format.forward(reader),
            Format::Espresso(format) => format.forward(reader),
            Format::Traj(format) => format.forward(reader),
        }
    }

    fn finalize(&mut self, writer: &mut BufWriter<File>) -> Result<(), TrajError> {
        match self {
            Format::XYZ(format) => format.finalize(writer),
            Format::Poscar(format) => format.finalize(writer),
            Format::Espresso(format) => format.finalize(writer),
            Format::Traj(format) => format.finalize(writer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_from_file_names() {
        let guess = |name: &str| FormatKind::guess(Path::new(name)).unwrap();
        assert_eq!(guess("md.xyz"), FormatKind::ExtXYZ);
        assert_eq!(guess("data/train.EXTXYZ"), FormatKind::ExtXYZ);
        assert_eq!(guess("md.traj"), FormatKind::Traj);
        assert_eq!(guess("relax.out"), FormatKind::Espresso);
        assert_eq!(guess("POSCAR"), FormatKind::Poscar);
        assert_eq!(guess("run/CONTCAR_final"), FormatKind::Poscar);
        assert_eq!(guess("bulk.vasp"), FormatKind::Poscar);
        assert!(matches!(
            FormatKind::guess(Path::new("notes.txt")),
            Err(TrajError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn names_round_trip() {
        for kind in [
            FormatKind::XYZ,
            FormatKind::ExtXYZ,
            FormatKind::Poscar,
            FormatKind::Espresso,
            FormatKind::Traj,
            FormatKind::Guess,
        ] {
            assert_eq!(kind.to_string().parse::<FormatKind>().unwrap(), kind);
        }
        assert!("pdb".parse::<FormatKind>().is_err());
    }
}
