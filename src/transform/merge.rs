//! Merge CP2K position and force trajectories into one labeled dataset.

use super::{REF_ENERGY, REF_FORCES};
use crate::error::TrajError;
use crate::frame::Frame;
use crate::property::Property;
use crate::unit_cell::{CellParameters, UnitCell};
use crate::units::{BOHR, HARTREE};
use log::debug;
use std::num::NonZeroUsize;

/// Info keys written by CP2K that have no meaning in the merged output.
const CP2K_KEYS: [&str; 3] = ["E", "time", "i"];

/// Checks that both trajectories have the same number of frames, and the
/// same number of atoms in each pair of frames.
pub fn check_pairing(positions: &[Frame], forces: &[Frame]) -> Result<(), TrajError> {
    if positions.len() != forces.len() {
        return Err(TrajError::Precondition(format!(
            "Number of frames in positions ({}) and forces ({}) does not match",
            positions.len(),
            forces.len()
        )));
    }
    for (index, (pos, force)) in positions.iter().zip(forces).enumerate() {
        if pos.size() != force.size() {
            return Err(TrajError::Precondition(format!(
                "Number of atoms in positions ({}) and forces ({}) does not match at frame {index}",
                pos.size(),
                force.size()
            )));
        }
    }
    Ok(())
}

/// Labels the positions frame `index` with the forces of `forces`.
///
/// The coordinates of `forces` are CP2K forces in Hartree/Bohr; they become
/// the `REF_forces` array in eV/Å. The CP2K energy `E` becomes `REF_energy`.
pub fn merge_frame(
    index: usize,
    mut positions: Frame,
    forces: &Frame,
    cell: &UnitCell,
) -> Result<Frame, TrajError> {
    let energy = positions
        .properties
        .get_f64("E")
        .ok_or_else(|| TrajError::missing(index, "E"))?;

    let reference = forces
        .atoms()
        .iter()
        .map(|atom| Property::Vector3D(atom.position.map(|f| f * HARTREE / BOHR)))
        .collect();
    positions.set_array(REF_FORCES, reference)?;

    positions.pbc = [true; 3];
    positions.unit_cell = cell.clone();
    positions
        .properties
        .insert(REF_ENERGY.to_string(), Property::Double(energy * HARTREE));
    for key in CP2K_KEYS {
        positions.properties.remove(key);
    }
    Ok(positions)
}

/// Merges every `stride`-th pair of frames, starting with the first one.
///
/// All frames are validated before anything is merged.
pub fn merge_positions_forces(
    positions: Vec<Frame>,
    forces: Vec<Frame>,
    cell: &CellParameters,
    stride: NonZeroUsize,
) -> Result<Vec<Frame>, TrajError> {
    check_pairing(&positions, &forces)?;
    let cell = UnitCell::from_parameters(cell)?;

    let merged = positions
        .into_iter()
        .zip(&forces)
        .enumerate()
        .step_by(stride.get())
        .map(|(index, (pos, force))| {
            debug!("merging frame {index}");
            merge_frame(index, pos, force, &cell)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use assert_approx_eq::assert_approx_eq;

    fn cp2k_frame(i: i64, energy: f64, coordinate: f64) -> Frame {
        let mut frame = Frame::new();
        frame.add_atom(Atom::new("O", [coordinate, 0.0, 0.0]));
        frame.add_atom(Atom::new("H", [0.0, coordinate, 0.0]));
        frame.properties.insert("i".into(), Property::Int(i));
        frame.properties.insert("time".into(), Property::Double(0.5 * i as f64));
        frame.properties.insert("E".into(), Property::Double(energy));
        frame
    }

    fn cubic() -> CellParameters {
        CellParameters::new([10.0; 3], [90.0; 3])
    }

    #[test]
    fn merge_with_stride() {
        let positions = (0..5).map(|i| cp2k_frame(i, -17.0, 1.0)).collect();
        let forces = (0..5).map(|i| cp2k_frame(i, -17.0, 0.01 * i as f64)).collect();

        let stride = NonZeroUsize::new(2).unwrap();
        let merged = merge_positions_forces(positions, forces, &cubic(), stride).unwrap();
        assert_eq!(merged.len(), 3);

        let frame = &merged[2];
        assert_eq!(frame.pbc, [true; 3]);
        assert_approx_eq!(frame.unit_cell.vector(2)[2], 10.0);
        assert_approx_eq!(frame.properties["REF_energy"].expect_double(), -17.0 * HARTREE);
        for key in ["E", "time", "i"] {
            assert!(!frame.properties.contains_key(key));
        }
        let forces = frame.vector_array("REF_forces").unwrap();
        assert_approx_eq!(forces[0][0], 0.04 * HARTREE / BOHR);
        assert_approx_eq!(forces[1][1], 0.04 * HARTREE / BOHR);
        assert_eq!(frame.positions()[0], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn mismatched_inputs() {
        let positions = vec![cp2k_frame(0, -1.0, 1.0); 2];
        let forces = vec![cp2k_frame(0, -1.0, 1.0); 3];
        let err = merge_positions_forces(positions, forces, &cubic(), NonZeroUsize::MIN).unwrap_err();
        assert!(matches!(err, TrajError::Precondition(_)));

        let positions = vec![cp2k_frame(0, -1.0, 1.0)];
        let mut short = Frame::new();
        short.add_atom(Atom::new("O", [0.0; 3]));
        let err = merge_positions_forces(positions, vec![short], &cubic(), NonZeroUsize::MIN).unwrap_err();
        assert!(err.to_string().contains("Number of atoms"), "{err}");
    }

    #[test]
    fn missing_energy() {
        let mut frame = cp2k_frame(0, -1.0, 1.0);
        frame.properties.remove("E");
        let err = merge_positions_forces(
            vec![cp2k_frame(0, -1.0, 1.0), frame.clone()],
            vec![frame.clone(), frame],
            &cubic(),
            NonZeroUsize::MIN,
        )
        .unwrap_err();
        assert!(matches!(err, TrajError::MissingField { frame: 1, .. }), "{err}");
    }
}
