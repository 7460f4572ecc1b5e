pub mod atom;
pub mod cli;
pub mod cp2k;
pub mod elements;
pub mod error;
pub mod extendedxyzparser;
pub mod format;
pub mod formats;
pub mod frame;
pub mod property;
pub mod tools;
pub mod trajectory;
pub mod transform;
pub mod unit_cell;
pub mod units;

use std::{hint::black_box, path::Path};
use trajectory::Trajectory;

/// Read a trajectory file and return the total number of atoms processed
pub fn read_trajectory(path: &Path) -> Result<usize, error::TrajError> {
    let mut trajectory = Trajectory::open(path)?;
    let mut total_atoms = 0;
    while let Some(next_frame) = trajectory.read()? {
        total_atoms += next_frame.size();
    }
    Ok(black_box(total_atoms))
}
