//! Keep only frames where a model agrees with the reference labels.

use super::{REF_ENERGY, REF_FORCES};
use crate::error::TrajError;
use crate::frame::Frame;
use log::debug;

/// Candidate fields dropped from retained frames.
pub const CANDIDATE_INFO: [&str; 3] = ["energy", "free_energy", "stress"];
pub const CANDIDATE_ARRAY: &str = "forces";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    energy: f64,
    force: f64,
}

impl Thresholds {
    pub fn new(energy: f64, force: f64) -> Result<Self, TrajError> {
        for (name, value) in [("energy", energy), ("force", force)] {
            // also rejects NaN
            if !(value >= 0.0) {
                return Err(TrajError::InvalidArgument(format!(
                    "{name} threshold must be non-negative, got {value}"
                )));
            }
        }
        Ok(Thresholds { energy, force })
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn force(&self) -> f64 {
        self.force
    }
}

/// Disagreement between the reference and candidate labels of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// `|REF_energy - energy|`
    pub energy_error: f64,
    /// Largest per-atom norm of `REF_forces - forces`, 0 without atoms and
    /// NaN when any force is NaN.
    pub force_difference: f64,
}

impl Evaluation {
    /// Both errors strictly below their thresholds.
    pub fn passes(&self, thresholds: &Thresholds) -> bool {
        self.energy_error < thresholds.energy && self.force_difference < thresholds.force
    }
}

/// Compares the labels of frame `index` without modifying it.
pub fn evaluate(index: usize, frame: &Frame) -> Result<Evaluation, TrajError> {
    let info = |name: &str| {
        frame
            .properties
            .get_f64(name)
            .ok_or_else(|| TrajError::missing(index, name))
    };
    let array = |name: &str| {
        frame
            .vector_array(name)
            .ok_or_else(|| TrajError::missing(index, name))
    };

    let energy_error = (info(REF_ENERGY)? - info("energy")?).abs();

    let reference = array(REF_FORCES)?;
    let forces = array(CANDIDATE_ARRAY)?;
    let force_difference = reference
        .iter()
        .zip(&forces)
        .map(|(r, f)| {
            let [dx, dy, dz] = [r[0] - f[0], r[1] - f[1], r[2] - f[2]];
            (dx * dx + dy * dy + dz * dz).sqrt()
        })
        // NaN must survive so a diverged frame fails the threshold
        .fold(0.0, |max, d| if d.is_nan() || d > max { d } else { max });

    Ok(Evaluation {
        energy_error,
        force_difference,
    })
}

/// Removes the candidate energy, stress and forces, leaving the reference labels.
pub fn strip_candidates(mut frame: Frame) -> Frame {
    for key in CANDIDATE_INFO {
        frame.properties.remove(key);
    }
    frame.remove_array(CANDIDATE_ARRAY);
    frame
}

/// Evaluates frame `index`, returning it (stripped if asked) when it passes.
pub fn filter_frame(
    index: usize,
    frame: Frame,
    thresholds: &Thresholds,
    strip: bool,
) -> Result<Option<Frame>, TrajError> {
    let evaluation = evaluate(index, &frame)?;
    debug!(
        "frame {index}: energy error {:.6}, force difference {:.6}",
        evaluation.energy_error,
        evaluation.force_difference
    );
    if !evaluation.passes(thresholds) {
        return Ok(None);
    }
    Ok(Some(if strip { strip_candidates(frame) } else { frame }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::property::Property;
    use assert_approx_eq::assert_approx_eq;

    fn labeled(reference: f64, energy: f64, force_offset: f64) -> Frame {
        let mut frame = Frame::new();
        frame.add_atom(Atom::new("Si", [0.0; 3]));
        frame.add_atom(Atom::new("Si", [1.3, 1.3, 1.3]));
        frame.properties.insert(REF_ENERGY.into(), Property::Double(reference));
        frame.properties.insert("energy".into(), Property::Double(energy));
        frame.properties.insert("free_energy".into(), Property::Double(energy));
        frame.properties.insert("stress".into(), Property::VectorXD(vec![0.0; 6]));
        frame
            .set_array(REF_FORCES, vec![Property::Vector3D([0.0; 3]); 2])
            .unwrap();
        frame
            .set_array(
                "forces",
                vec![
                    Property::Vector3D([0.0; 3]),
                    Property::Vector3D([0.0, 3.0 * force_offset, 4.0 * force_offset]),
                ],
            )
            .unwrap();
        frame
    }

    #[test]
    fn errors() {
        let evaluation = evaluate(0, &labeled(-10.0, -10.25, 0.1)).unwrap();
        assert_approx_eq!(evaluation.energy_error, 0.25);
        assert_approx_eq!(evaluation.force_difference, 0.5);
    }

    #[test]
    fn thresholds_are_strict() {
        let thresholds = Thresholds::new(0.5, 1.0).unwrap();
        let at_threshold = filter_frame(0, labeled(-10.0, -10.5, 0.0), &thresholds, true).unwrap();
        assert!(at_threshold.is_none());

        let below = filter_frame(0, labeled(-10.0, -10.5 + 1e-9, 0.0), &thresholds, true).unwrap();
        let below = below.unwrap();
        for key in CANDIDATE_INFO {
            assert!(!below.properties.contains_key(key));
        }
        assert!(below.array("forces").is_none());
        assert!(below.array(REF_FORCES).is_some());
        assert_approx_eq!(below.properties["REF_energy"].expect_double(), -10.0);

        let forces_off = filter_frame(0, labeled(-10.0, -10.0, 0.2), &thresholds, true).unwrap();
        assert!(forces_off.is_none());
    }

    #[test]
    fn nan_forces_are_rejected() {
        let mut frame = labeled(-10.0, -10.0, 0.0);
        frame
            .set_array(
                "forces",
                vec![Property::Vector3D([f64::NAN, 0.0, 0.0]), Property::Vector3D([0.0; 3])],
            )
            .unwrap();
        assert!(evaluate(0, &frame).unwrap().force_difference.is_nan());

        let thresholds = Thresholds::new(1.0, 1.0).unwrap();
        assert!(filter_frame(0, frame, &thresholds, true).unwrap().is_none());
    }

    #[test]
    fn keep_candidates() {
        let thresholds = Thresholds::new(1.0, 1.0).unwrap();
        let frame = filter_frame(0, labeled(-10.0, -10.0, 0.0), &thresholds, false)
            .unwrap()
            .unwrap();
        assert!(frame.properties.contains_key("energy"));
        assert!(frame.array("forces").is_some());
    }

    #[test]
    fn missing_fields() {
        let mut frame = labeled(-10.0, -10.0, 0.0);
        frame.remove_array("forces");
        let err = evaluate(4, &frame).unwrap_err();
        assert!(matches!(err, TrajError::MissingField { frame: 4, ref name } if name == "forces"));

        let mut frame = labeled(-10.0, -10.0, 0.0);
        frame.properties.remove("REF_energy");
        assert!(evaluate(0, &frame).is_err());
    }

    #[test]
    fn empty_frame_has_no_force_difference() {
        let mut frame = Frame::new();
        frame.properties.insert(REF_ENERGY.into(), Property::Double(1.0));
        frame.properties.insert("energy".into(), Property::Double(1.0));
        let evaluation = evaluate(0, &frame).unwrap();
        assert_eq!(evaluation.force_difference, 0.0);
    }

    #[test]
    fn negative_thresholds() {
        assert!(Thresholds::new(-0.1, 1.0).is_err());
        assert!(Thresholds::new(0.1, f64::NAN).is_err());
        assert!(Thresholds::new(0.0, 0.0).is_ok());
    }
}
