//! File to file pipelines, one per command line tool.
//!
//! Each pipeline reads its inputs, applies a transform and writes through a
//! [`Trajectory`] sink, so a failure at any point leaves no output file.

use crate::cp2k::{self, MarkerScanner};
use crate::error::TrajError;
use crate::format::FormatKind;
use crate::frame::Frame;
use crate::trajectory::Trajectory;
use crate::transform::filter::{self, Thresholds};
use crate::transform::sample::Selection;
use crate::transform::{label, merge, supercell};
use crate::unit_cell::CellParameters;
use crate::units::HARTREE_ROUNDED;
use log::{debug, info};
use std::num::NonZeroUsize;
use std::path::Path;

/// Writes all `frames` to `path` in the given format.
pub fn write_frames(
    path: &Path,
    kind: FormatKind,
    frames: impl IntoIterator<Item = Frame>,
) -> Result<usize, TrajError> {
    let mut output = Trajectory::create_with_format(path, kind)?;
    let mut count = 0;
    for frame in frames {
        output.write(&frame)?;
        count += 1;
    }
    output.finish()?;
    Ok(count)
}

/// Last frame of the file at `path`.
fn read_last(path: &Path) -> Result<Frame, TrajError> {
    let mut last = None;
    for frame in Trajectory::open(path)? {
        last = Some(frame?);
    }
    last.ok_or_else(|| TrajError::format("input", format!("`{}` has no frames", path.display())))
}

/// Combines CP2K position and force trajectories into a training set.
pub fn cp2mace(
    positions: &Path,
    forces: &Path,
    cell: &CellParameters,
    stride: NonZeroUsize,
    output: &Path,
) -> Result<usize, TrajError> {
    let positions = Trajectory::read_all(positions)?;
    let forces = Trajectory::read_all(forces)?;
    info!("read {} position and {} force frames", positions.len(), forces.len());

    let merged = merge::merge_positions_forces(positions, forces, cell, stride)?;
    write_frames(output, FormatKind::ExtXYZ, merged)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub kept: usize,
    pub dropped: usize,
}

/// Streams `input`, keeping the frames whose labels agree within `thresholds`.
pub fn filter_dataset(
    input: &Path,
    output: &Path,
    thresholds: &Thresholds,
    strip: bool,
) -> Result<FilterSummary, TrajError> {
    let mut sink = Trajectory::create_with_format(output, FormatKind::ExtXYZ)?;
    let mut summary = FilterSummary::default();
    for (index, frame) in Trajectory::open(input)?.enumerate() {
        match filter::filter_frame(index, frame?, thresholds, strip)? {
            Some(frame) => {
                sink.write(&frame)?;
                summary.kept += 1;
            }
            None => summary.dropped += 1,
        }
    }
    sink.finish()?;
    info!(
        "kept {} frames, dropped {} (energy < {}, force < {})",
        summary.kept,
        summary.dropped,
        thresholds.energy(),
        thresholds.force()
    );
    Ok(summary)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinglePoint {
    /// Energy in eV.
    pub energy: f64,
    pub cell: CellParameters,
}

/// Labels the structure in `input` with the energy of a CP2K single point
/// calculation and the cell of its input file.
pub fn get_atomic_cp2k(
    input: &Path,
    output: &Path,
    cp2k_input: &Path,
    cp2k_output: &Path,
) -> Result<SinglePoint, TrajError> {
    let frame = read_last(input)?;
    let energy = cp2k::read_energy(&MarkerScanner::open(cp2k_output)?)?;
    let cell = cp2k::read_lattice(&MarkerScanner::open(cp2k_input)?)?;

    let frame = label::label_single_point(frame, energy, &cell)?;
    write_frames(output, FormatKind::ExtXYZ, [frame])?;
    Ok(SinglePoint {
        energy: energy * HARTREE_ROUNDED,
        cell,
    })
}

/// Converts a structure (typically a POSCAR) to extended XYZ, optionally
/// as a supercell. Returns the number of atoms written.
pub fn pos2xyz(input: &Path, output: &Path, repeat: [usize; 3]) -> Result<usize, TrajError> {
    let frame = supercell::repeat(read_last(input)?, repeat)?;
    let natoms = frame.size();
    write_frames(output, FormatKind::Guess, [frame])?;
    Ok(natoms)
}

/// Converts a Quantum ESPRESSO output file, keeping only the final image
/// unless `all` is set.
pub fn qe2extxyz(input: &Path, output: &Path, all: bool) -> Result<usize, TrajError> {
    let mut frames = Trajectory::open_with_format(input, FormatKind::Espresso)?
        .collect::<Result<Vec<_>, _>>()?;
    if frames.is_empty() {
        return Err(TrajError::format(
            "Quantum ESPRESSO",
            format!("no converged SCF step in `{}`", input.display()),
        ));
    }
    if !all {
        frames.drain(..frames.len() - 1);
    }
    write_frames(output, FormatKind::ExtXYZ, frames)
}

/// Copies the frames of `input` picked by `selection`, in their original order.
pub fn random_select(
    input: &Path,
    output: &Path,
    selection: &Selection,
    kind: FormatKind,
) -> Result<usize, TrajError> {
    let source = Trajectory::open(input)?;
    let total = source.size()?;
    let selected = selection.resolve(total)?;
    info!("selected {} of {total} frames", selected.len());

    let mut sink = Trajectory::create_with_format(output, kind)?;
    let last = selected.last().copied();
    for (index, frame) in source.enumerate() {
        if Some(index) > last {
            break;
        }
        let frame = frame?;
        if selected.contains(&index) {
            debug!("writing frame {index}");
            sink.write(&frame)?;
        }
    }
    sink.finish()?;
    Ok(selected.len())
}

/// Converts an ASE trajectory to XYZ, one frame at a time.
pub fn traj2xyz(input: &Path, output: &Path) -> Result<usize, TrajError> {
    let source = Trajectory::open_with_format(input, FormatKind::Traj)?;
    let total = source.size()?;
    let step = (total / 10).max(1);

    let mut sink = Trajectory::create(output)?;
    let mut count = 0;
    for frame in source {
        sink.write(&frame?)?;
        count += 1;
        if count % step == 0 || count == total {
            info!("{count}/{total} frames converted");
        }
    }
    sink.finish()?;
    Ok(count)
}
