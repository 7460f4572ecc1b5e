use crate::error::TrajError;
use crate::frame::Frame;

/// Repeat `frame` `nx × ny × nz` times along its lattice vectors.
///
/// Atoms are laid out copy by copy, the copy index running over `nz`
/// fastest, and each copy keeps the original atom order and per-atom
/// properties. Frame info is carried over unchanged.
pub fn repeat(frame: Frame, repeat: [usize; 3]) -> Result<Frame, TrajError> {
    if repeat.contains(&0) {
        return Err(TrajError::InvalidArgument(format!(
            "supercell dimensions must be positive, got {repeat:?}"
        )));
    }
    if repeat == [1, 1, 1] {
        return Ok(frame);
    }
    if frame.unit_cell.is_infinite() {
        return Err(TrajError::Precondition(
            "cannot build a supercell of a frame without a unit cell".to_string(),
        ));
    }

    let [nx, ny, nz] = repeat;
    let [a, b, c] = [0, 1, 2].map(|i| frame.unit_cell.vector(i));

    let mut supercell = Frame::with_capacity(frame.size() * nx * ny * nz);
    supercell.unit_cell = frame.unit_cell.scaled(repeat);
    supercell.pbc = frame.pbc;
    supercell.properties = frame.properties.clone();

    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let [i, j, k] = [i, j, k].map(|n| n as f64);
                let shift = [0, 1, 2].map(|d| i * a[d] + j * b[d] + k * c[d]);
                for atom in frame.atoms() {
                    supercell.add_atom(atom.translated(shift));
                }
            }
        }
    }
    Ok(supercell)
}
