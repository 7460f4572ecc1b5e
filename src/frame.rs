use crate::atom::Atom;
use crate::error::TrajError;
use crate::property::{Properties, Property};
use crate::unit_cell::UnitCell;
use std::collections::BTreeSet;
use std::ops::{Index, IndexMut};

/// One atomic-structure snapshot.
///
/// Per-atom arrays (`forces`, `REF_forces`, ...) live in the properties of
/// each [`Atom`], which keeps every array the same length as the atom list.
/// Frame-level metadata (`energy`, `REF_energy`, `time`, ...) lives in
/// [`Frame::properties`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    pub unit_cell: UnitCell,
    pub pbc: [bool; 3],
    pub properties: Properties,
    atoms: Vec<Atom>,
}

impl Frame {
    pub fn new() -> Self {
        Frame {
            unit_cell: UnitCell::new(),
            pbc: [false; 3],
            properties: Properties::new(),
            atoms: Vec::new(),
        }
    }

    pub fn with_capacity(natoms: usize) -> Self {
        Frame {
            atoms: Vec::with_capacity(natoms),
            ..Frame::new()
        }
    }

    pub fn size(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn add_atom(&mut self, atom: Atom) {
        self.atoms.push(atom)
    }

    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.symbol.as_str()).collect()
    }

    /// Names of the per-atom arrays, taken from the first atom.
    pub fn array_names(&self) -> BTreeSet<String> {
        self.atoms
            .first()
            .map(|atom| atom.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Values of the per-atom array `name`, or `None` if any atom lacks it.
    pub fn array(&self, name: &str) -> Option<Vec<&Property>> {
        self.atoms
            .iter()
            .map(|atom| atom.properties.get(name))
            .collect()
    }

    /// Per-atom array `name` as 3-vectors.
    pub fn vector_array(&self, name: &str) -> Option<Vec<[f64; 3]>> {
        self.atoms
            .iter()
            .map(|atom| atom.properties.get(name).and_then(Property::as_vector3d))
            .collect()
    }

    /// Set the per-atom array `name`, one value per atom.
    pub fn set_array(&mut self, name: &str, values: Vec<Property>) -> Result<(), TrajError> {
        if values.len() != self.size() {
            return Err(TrajError::Precondition(format!(
                "array `{name}` has {} values but the frame has {} atoms",
                values.len(),
                self.size()
            )));
        }
        for (atom, value) in self.atoms.iter_mut().zip(values) {
            atom.properties.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Remove the per-atom array `name`, returning whether it existed.
    pub fn remove_array(&mut self, name: &str) -> bool {
        let mut removed = false;
        for atom in &mut self.atoms {
            removed |= atom.properties.remove(name).is_some();
        }
        removed
    }

    pub fn is_periodic(&self) -> bool {
        self.pbc.iter().all(|&p| p)
    }
}

impl Index<usize> for Frame {
    type Output = Atom;

    fn index(&self, index: usize) -> &Self::Output {
        &self.atoms[index]
    }
}

impl IndexMut<usize> for Frame {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.atoms[index]
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn water() -> Frame {
        let mut frame = Frame::new();
        frame.add_atom(Atom::new("O", [0.0, 0.0, 0.0]));
        frame.add_atom(Atom::new("H", [0.757, 0.586, 0.0]));
        frame.add_atom(Atom::new("H", [-0.757, 0.586, 0.0]));
        frame
    }

    #[test]
    fn test_frame_indexing() {
        let mut frame = water();

        assert_eq!(frame[0].symbol, "O");
        assert_eq!(frame[1].symbol, "H");
        assert_approx_eq!(frame[1].position[0], 0.757);

        frame[0].position[0] = 10.0;
        assert_approx_eq!(frame[0].position[0], 10.0);
        assert_eq!(frame.symbols(), vec!["O", "H", "H"]);
    }

    #[test]
    #[should_panic]
    fn test_frame_indexing_out_of_bounds() {
        let frame = Frame::new();
        let _ = frame[0];
    }

    #[test]
    fn arrays_follow_atoms() {
        let mut frame = water();
        let forces = vec![Property::Vector3D([1.0, 0.0, 0.0]); 3];
        frame.set_array("forces", forces).unwrap();

        assert!(frame.array_names().contains("forces"));
        assert_eq!(frame.vector_array("forces").unwrap()[2], [1.0, 0.0, 0.0]);
        assert!(frame.array("charges").is_none());

        assert!(frame.remove_array("forces"));
        assert!(!frame.remove_array("forces"));
        assert!(frame.array_names().is_empty());
    }

    #[test]
    fn array_length_must_match() {
        let mut frame = water();
        let err = frame
            .set_array("forces", vec![Property::Vector3D([0.0; 3])])
            .unwrap_err();
        assert!(matches!(err, TrajError::Precondition(_)));
    }
}
