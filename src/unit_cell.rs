use crate::error::TrajError;
use core::f64;
use nalgebra::{Matrix3, Vector3};

type Vec3D = [f64; 3];

/// Lattice of a periodic frame.
///
/// Rows of `cell_matrix` are the lattice vectors `a`, `b` and `c` in Å. An
/// all-zero matrix stands for "no cell".
#[derive(Default, Debug, Clone)]
pub struct UnitCell {
    pub cell_matrix: Matrix3<f64>,
}

impl PartialEq for UnitCell {
    fn eq(&self, other: &Self) -> bool {
        self.cell_matrix
            .iter()
            .zip(other.cell_matrix.iter())
            .all(|(a, b)| (a - b).abs() < f64::EPSILON)
    }
}

/// Cell given as lengths `(a, b, c)` and angles `(alpha, beta, gamma)` in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellParameters {
    pub lengths: Vec3D,
    pub angles: Vec3D,
}

impl CellParameters {
    pub fn new(lengths: Vec3D, angles: Vec3D) -> Self {
        CellParameters { lengths, angles }
    }

    /// Accepts either `a b c` (right angles) or `a b c alpha beta gamma`.
    pub fn from_slice(values: &[f64]) -> Result<Self, TrajError> {
        match *values {
            [a, b, c] => Ok(Self::new([a, b, c], [90.0; 3])),
            [a, b, c, alpha, beta, gamma] => Ok(Self::new([a, b, c], [alpha, beta, gamma])),
            _ => Err(TrajError::InvalidArgument(format!(
                "a cell needs 3 lengths or 3 lengths and 3 angles, got {} values",
                values.len()
            ))),
        }
    }
}

impl UnitCell {
    const EPSILON: f64 = 1e-5;
    /// Below this, a cosine or sine is snapped to an exact 0 or 1.
    const SNAP: f64 = 1e-10;

    fn deg2rad(x: f64) -> f64 {
        x * f64::consts::PI / 180.0
    }

    fn rad2deg(x: f64) -> f64 {
        x * 180.0 / f64::consts::PI
    }

    fn cos_degree(theta: f64) -> f64 {
        if (theta - 90.0).abs() < Self::SNAP {
            0.0
        } else {
            Self::deg2rad(theta).cos()
        }
    }

    fn sin_degree(theta: f64) -> f64 {
        if (theta - 90.0).abs() < Self::SNAP {
            1.0
        } else {
            Self::deg2rad(theta).sin()
        }
    }

    pub fn new() -> Self {
        UnitCell {
            cell_matrix: Matrix3::zeros(),
        }
    }

    pub fn from_vectors(a: Vec3D, b: Vec3D, c: Vec3D) -> Self {
        UnitCell {
            cell_matrix: Matrix3::new(a[0], a[1], a[2], b[0], b[1], b[2], c[0], c[1], c[2]),
        }
    }

    /// Parse the nine numbers of an extended XYZ `Lattice` entry (`a`, then `b`, then `c`).
    pub fn parse(lattice: &str) -> Result<Self, TrajError> {
        let values = lattice
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() != 9 {
            return Err(TrajError::format(
                "extended XYZ",
                format!("Lattice needs 9 numbers, got {}", values.len()),
            ));
        }
        Ok(UnitCell {
            cell_matrix: Matrix3::from_row_slice(&values),
        })
    }

    fn check_lengths(lengths: &Vec3D) -> Result<(), TrajError> {
        if lengths.iter().any(|&x| x < 0.0) {
            return Err(TrajError::InvalidArgument(
                "lengths cannot be negative".to_string(),
            ));
        };

        Ok(())
    }

    fn check_angles(angles: &Vec3D) -> Result<(), TrajError> {
        if angles.iter().any(|&x| x < 0.0) {
            return Err(TrajError::InvalidArgument(
                "angles cannot be negative".to_string(),
            ));
        };

        if angles.iter().any(|&x| x.abs() < Self::EPSILON) {
            return Err(TrajError::InvalidArgument(
                "angles cannot be (roughly) zero".to_string(),
            ));
        }

        if angles.iter().any(|&x| x >= 180.0) {
            return Err(TrajError::InvalidArgument(
                "angles cannot be larger than or equal to 180 degrees".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the lattice with `a` along x and `b` in the xy plane.
    pub fn from_parameters(parameters: &CellParameters) -> Result<Self, TrajError> {
        let lengths = parameters.lengths;
        let angles = parameters.angles;
        Self::check_lengths(&lengths)?;
        Self::check_angles(&angles)?;

        let [cos_alpha, cos_beta, cos_gamma] = angles.map(Self::cos_degree);
        let sin_gamma = Self::sin_degree(angles[2]);

        let cx = cos_beta;
        let cy = (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let cz_squared = 1.0 - cx * cx - cy * cy;
        if cz_squared <= 0.0 {
            return Err(TrajError::InvalidArgument(format!(
                "angles {angles:?} do not describe a valid cell"
            )));
        }

        Ok(Self::from_vectors(
            [lengths[0], 0.0, 0.0],
            [lengths[1] * cos_gamma, lengths[1] * sin_gamma, 0.0],
            [
                lengths[2] * cx,
                lengths[2] * cy,
                lengths[2] * cz_squared.sqrt(),
            ],
        ))
    }

    /// Whether the cell is absent (all-zero matrix).
    pub fn is_infinite(&self) -> bool {
        self.cell_matrix.iter().all(|&x| x == 0.0)
    }

    /// The lattice vector at `index` (0 for `a`, 1 for `b`, 2 for `c`).
    pub fn vector(&self, index: usize) -> Vec3D {
        let row = self.cell_matrix.row(index);
        [row[0], row[1], row[2]]
    }

    pub fn lengths(&self) -> Vec3D {
        [0, 1, 2].map(|i| self.cell_matrix.row(i).norm())
    }

    pub fn angles(&self) -> Vec3D {
        let angle = |i: usize, j: usize| {
            let u = self.cell_matrix.row(i);
            let v = self.cell_matrix.row(j);
            Self::rad2deg((u.dot(&v) / (u.norm() * v.norm())).clamp(-1.0, 1.0).acos())
        };
        [angle(1, 2), angle(0, 2), angle(0, 1)]
    }

    pub fn volume(&self) -> f64 {
        self.cell_matrix.determinant().abs()
    }

    /// Cartesian position of the fractional coordinates `fractional`.
    pub fn cartesian(&self, fractional: Vec3D) -> Vec3D {
        let cart = self.cell_matrix.transpose() * Vector3::from(fractional);
        [cart[0], cart[1], cart[2]]
    }

    /// Copy of the cell with each lattice vector multiplied by the matching factor.
    pub fn scaled(&self, factors: [usize; 3]) -> Self {
        let mut cell_matrix = self.cell_matrix;
        for (i, factor) in factors.into_iter().enumerate() {
            for j in 0..3 {
                cell_matrix[(i, j)] *= factor as f64;
            }
        }
        UnitCell { cell_matrix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::Matrix3;

    #[test]
    fn test_unit_cell_new() {
        let cell = UnitCell::new();
        assert_eq!(cell.cell_matrix, Matrix3::zeros());
        assert!(cell.is_infinite());
    }

    #[test]
    fn test_unit_cell_parse() {
        let lattice = "1.0 2.0 3.0 4.0 5.0 6.0 7.0 8.0 9.0";
        let cell = UnitCell::parse(lattice).unwrap();

        let expected = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        assert_eq!(cell.cell_matrix, expected);
        assert_eq!(cell.vector(1), [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_unit_cell_parse_wrong_count() {
        assert!(UnitCell::parse("1 2 3").is_err());
        assert!(UnitCell::parse("1 2 3 4 5 6 7 8 x").is_err());
    }

    #[test]
    fn test_check_lengths_valid() {
        let lengths = [1.0, 2.0, 3.0];
        assert!(UnitCell::check_lengths(&lengths).is_ok());
    }

    #[test]
    #[should_panic(expected = "lengths cannot be negative")]
    fn test_check_lengths_invalid() {
        let lengths = [-1.0, -2.0, -3.0];
        UnitCell::check_lengths(&lengths).unwrap();
    }

    #[test]
    fn from_lengths_angles() {
        let parameters = CellParameters::new(
            [8.43116035, 14.50510613, 15.60911468],
            [73.31699212, 85.70200582, 89.37501529],
        );
        let cell = UnitCell::from_parameters(&parameters).unwrap();
        let true_cell = UnitCell::from_vectors(
            [8.43116035, 0.0, 0.0],
            [0.158219155128, 14.5042431863, 0.0],
            [1.16980663624, 4.4685149855, 14.9100096405],
        );
        let diff = cell.cell_matrix - true_cell.cell_matrix;
        assert!((diff).iter().all(|&x| x.abs() < 1e-6), "diff: {diff}");

        let lengths = cell.lengths();
        let angles = cell.angles();
        for i in 0..3 {
            assert_approx_eq!(lengths[i], parameters.lengths[i], 1e-9);
            assert_approx_eq!(angles[i], parameters.angles[i], 1e-9);
        }
    }

    #[test]
    fn right_angles_are_exact() {
        let parameters = CellParameters::from_slice(&[10.0, 11.0, 12.0]).unwrap();
        let cell = UnitCell::from_parameters(&parameters).unwrap();
        assert_eq!(
            cell,
            UnitCell::from_vectors([10.0, 0.0, 0.0], [0.0, 11.0, 0.0], [0.0, 0.0, 12.0])
        );
        assert_approx_eq!(cell.volume(), 1320.0, 1e-9);
    }

    #[test]
    fn cell_parameters_need_three_or_six_values() {
        assert!(CellParameters::from_slice(&[1.0, 2.0]).is_err());
        assert!(CellParameters::from_slice(&[1.0; 4]).is_err());
        let p = CellParameters::from_slice(&[1.0, 2.0, 3.0, 80.0, 90.0, 120.0]).unwrap();
        assert_eq!(p.angles, [80.0, 90.0, 120.0]);
    }

    #[test]
    fn fractional_to_cartesian() {
        let cell = UnitCell::from_vectors([2.0, 0.0, 0.0], [1.0, 2.0, 0.0], [0.0, 0.0, 3.0]);
        let cart = cell.cartesian([0.5, 0.5, 1.0]);
        assert_approx_eq!(cart[0], 1.5);
        assert_approx_eq!(cart[1], 1.0);
        assert_approx_eq!(cart[2], 3.0);
    }

    #[test]
    fn scaled_cell() {
        let cell = UnitCell::from_vectors([2.0, 0.0, 0.0], [1.0, 2.0, 0.0], [0.0, 0.0, 3.0]);
        let big = cell.scaled([2, 1, 3]);
        assert_eq!(big.vector(0), [4.0, 0.0, 0.0]);
        assert_eq!(big.vector(1), [1.0, 2.0, 0.0]);
        assert_eq!(big.vector(2), [0.0, 0.0, 9.0]);
    }

    #[test]
    #[should_panic(expected = "angles cannot be negative")]
    fn test_check_angles_invalid_negative() {
        let angles = [-90.0, -90.0, -90.0];
        UnitCell::check_angles(&angles).unwrap();
    }

    #[test]
    #[should_panic(expected = "angles cannot be (roughly) zero")]
    fn test_check_angles_invalid_zero() {
        let angles = [0.0, 0.0, 0.0];
        UnitCell::check_angles(&angles).unwrap();
    }

    #[test]
    #[should_panic(expected = "angles cannot be larger than or equal to 180 degrees")]
    fn test_check_angles_invalid_180() {
        let angles = [180.0, 180.0, 180.0];
        UnitCell::check_angles(&angles).unwrap();
    }
}
