use super::REF_FORCES;
use crate::error::TrajError;
use crate::frame::Frame;
use crate::property::Property;
use crate::unit_cell::{CellParameters, UnitCell};
use crate::units::HARTREE_ROUNDED;

/// Attach a single-point CP2K energy (Hartree) and the simulation cell to
/// `frame`, with zero reference forces on every atom.
pub fn label_single_point(
    mut frame: Frame,
    energy: f64,
    cell: &CellParameters,
) -> Result<Frame, TrajError> {
    frame.unit_cell = UnitCell::from_parameters(cell)?;
    frame.pbc = [true; 3];
    frame.set_array(REF_FORCES, vec![Property::Vector3D([0.0; 3]); frame.size()])?;
    frame
        .properties
        .insert("energy".to_string(), Property::Double(energy * HARTREE_ROUNDED));
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn label_water() {
        let mut frame = Frame::new();
        frame.add_atom(Atom::new("O", [0.0, 0.0, 0.0]));
        frame.add_atom(Atom::new("H", [0.757, 0.586, 0.0]));
        frame.add_atom(Atom::new("H", [-0.757, 0.586, 0.0]));

        let cell = CellParameters::new([12.42; 3], [90.0; 3]);
        let frame = label_single_point(frame, -123.456, &cell).unwrap();

        assert_approx_eq!(frame.properties["energy"].expect_double(), -123.456 * 27.2114);
        assert_eq!(frame.pbc, [true; 3]);
        assert_approx_eq!(frame.unit_cell.vector(1)[1], 12.42);
        assert_eq!(frame.vector_array("REF_forces").unwrap(), vec![[0.0; 3]; 3]);
    }

    #[test]
    fn invalid_cell() {
        let cell = CellParameters::new([-1.0, 1.0, 1.0], [90.0; 3]);
        assert!(label_single_point(Frame::new(), -1.0, &cell).is_err());
    }
}
