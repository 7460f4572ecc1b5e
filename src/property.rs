use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use nalgebra::Matrix3;

use crate::error::TrajError;

const EPSILON: f64 = 1e-12;

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum PropertyKind {
    Bool,
    Int,
    Double,
    String,
    Vector3D,
    Matrix3x3,
    VectorXD,
}

#[derive(Debug, Clone)]
pub enum Property {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Vector3D([f64; 3]),
    Matrix3x3(Matrix3<f64>),
    VectorXD(Vec<f64>),
}

impl Default for Property {
    fn default() -> Self {
        Property::Bool(false)
    }
}

/// Returns `true` if `a` and `b` are both finite and within `epsilon` of each other.
/// Any `NaN` or infinite value always compares as `false`.
fn almost_eq(a: f64, b: f64, epsilon: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= epsilon
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Property::Bool(a), Property::Bool(b)) => a == b,
            (Property::Int(a), Property::Int(b)) => a == b,
            (Property::Double(a), Property::Double(b)) => almost_eq(*a, *b, EPSILON),
            (Property::String(a), Property::String(b)) => a == b,
            (Property::Vector3D(a), Property::Vector3D(b)) => a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| almost_eq(*x, *y, EPSILON)),
            (Property::Matrix3x3(a), Property::Matrix3x3(b)) => a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| almost_eq(*x, *y, EPSILON)),
            (Property::VectorXD(a), Property::VectorXD(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| almost_eq(*x, *y, EPSILON))
            }
            _ => false,
        }
    }
}

/// Named values attached to a frame (the `info` dictionary) or to a single atom.
///
/// Keys are kept sorted so that writers produce the same column and key
/// order on every run.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Properties(BTreeMap<String, Property>);

impl Properties {
    pub fn new() -> Self {
        Properties(BTreeMap::new())
    }

    /// Numeric value of `name`, accepting both integer and floating point entries.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Property::as_f64)
    }
}

impl Deref for Properties {
    type Target = BTreeMap<String, Property>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Properties {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for Properties {
    type Item = (String, Property);
    type IntoIter = <BTreeMap<String, Property> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a Property);
    type IntoIter = <&'a BTreeMap<String, Property> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Property)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, Property)>>(iter: T) -> Self {
        Properties(iter.into_iter().collect())
    }
}

impl Property {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Property::Bool(_) => PropertyKind::Bool,
            Property::Int(_) => PropertyKind::Int,
            Property::Double(_) => PropertyKind::Double,
            Property::String(_) => PropertyKind::String,
            Property::Vector3D(_) => PropertyKind::Vector3D,
            Property::Matrix3x3(_) => PropertyKind::Matrix3x3,
            Property::VectorXD(_) => PropertyKind::VectorXD,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let Property::Bool(b) = *self {
            Some(b)
        } else {
            None
        }
    }

    pub fn expect_bool(&self) -> bool {
        match *self {
            Property::Bool(b) => b,
            ref other => panic!("expected Bool, found {other:?}"),
        }
    }

    /// Scalar numeric value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Property::Double(x) => Some(x),
            Property::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    pub fn expect_double(&self) -> f64 {
        match self.as_f64() {
            Some(d) => d,
            None => panic!("expected Double, found {self:?}"),
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        if let Property::String(ref s) = *self {
            Some(s)
        } else {
            None
        }
    }

    pub fn expect_string(&self) -> &str {
        match *self {
            Property::String(ref s) => s,
            ref other => panic!("expected String, found {other:?}"),
        }
    }

    pub fn as_vector3d(&self) -> Option<[f64; 3]> {
        if let Property::Vector3D(v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn expect_vector3d(&self) -> [f64; 3] {
        match *self {
            Property::Vector3D(v) => v,
            ref other => panic!("expected Vector3D, found {other:?}"),
        }
    }

    pub fn expect_matrix3x3(&self) -> [f64; 9] {
        match *self {
            Property::Matrix3x3(m) => {
                let mut array = [0.0; 9];
                array.copy_from_slice(m.as_slice());
                array
            }
            ref other => panic!("expected Matrix3x3, found {other:?}"),
        }
    }

    pub fn parse_value(value: &str, kind: PropertyKind) -> Result<Property, TrajError> {
        match kind {
            PropertyKind::String => StringParser::parse(value),
            PropertyKind::Bool => BoolParser::parse(value),
            PropertyKind::Int => IntParser::parse(value),
            PropertyKind::Double => DoubleParser::parse(value),
            PropertyKind::Vector3D => Vector3DParser::parse(value),
            PropertyKind::Matrix3x3 => Matrix3x3Parser::parse(value),
            PropertyKind::VectorXD => VectorXDParser::parse(value),
        }
    }

    /// Guess the type of a free-form `info` value the way extended XYZ readers do:
    /// booleans, then integers, floats, 3-vectors, 3x3 matrices, other numeric
    /// vectors, and finally plain strings.
    pub fn infer(value: &str) -> Property {
        if matches!(value, "T" | "F" | "True" | "False" | "true" | "false") {
            if let Ok(p) = BoolParser::parse(value) {
                return p;
            }
        }

        let kind = match value.split_whitespace().count() {
            0 => return Property::String(String::new()),
            1 if value.parse::<i64>().is_ok() => PropertyKind::Int,
            1 => PropertyKind::Double,
            3 => PropertyKind::Vector3D,
            9 => PropertyKind::Matrix3x3,
            _ => PropertyKind::VectorXD,
        };
        Self::parse_value(value, kind).unwrap_or_else(|_| Property::String(value.to_string()))
    }
}

/// Helper trait for parsing values into Property
pub trait ValueParser {
    fn parse(value: &str) -> Result<Property, TrajError>;
}

pub struct StringParser;
pub struct BoolParser;
pub struct IntParser;
pub struct DoubleParser;
pub struct Vector3DParser;
pub struct Matrix3x3Parser;
pub struct VectorXDParser;

fn parse_floats(value: &str) -> Result<Vec<f64>, TrajError> {
    value
        .split_whitespace()
        .map(|p| p.parse::<f64>().map_err(TrajError::from))
        .collect()
}

impl ValueParser for StringParser {
    fn parse(value: &str) -> Result<Property, TrajError> {
        Ok(Property::String(value.to_string()))
    }
}

impl ValueParser for BoolParser {
    fn parse(value: &str) -> Result<Property, TrajError> {
        match value.to_lowercase().as_str() {
            "t" | "true" => Ok(Property::Bool(true)),
            "f" | "false" => Ok(Property::Bool(false)),
            _ => Err(TrajError::format(
                "extended XYZ",
                format!("Invalid boolean value: {value}"),
            )),
        }
    }
}

impl ValueParser for IntParser {
    fn parse(value: &str) -> Result<Property, TrajError> {
        Ok(Property::Int(value.trim().parse::<i64>()?))
    }
}

impl ValueParser for DoubleParser {
    fn parse(value: &str) -> Result<Property, TrajError> {
        Ok(Property::Double(value.trim().parse::<f64>()?))
    }
}

impl ValueParser for Vector3DParser {
    fn parse(value: &str) -> Result<Property, TrajError> {
        let parts = parse_floats(value)?;
        match parts[..] {
            [x, y, z] => Ok(Property::Vector3D([x, y, z])),
            _ => Err(TrajError::format(
                "extended XYZ",
                format!("Vector3D requires exactly 3 components, got {}", parts.len()),
            )),
        }
    }
}

impl ValueParser for Matrix3x3Parser {
    fn parse(value: &str) -> Result<Property, TrajError> {
        let parts = parse_floats(value)?;
        if parts.len() != 9 {
            return Err(TrajError::format(
                "extended XYZ",
                format!("Matrix3x3 requires exactly 9 components, got {}", parts.len()),
            ));
        }
        Ok(Property::Matrix3x3(Matrix3::from_row_slice(&parts)))
    }
}

impl ValueParser for VectorXDParser {
    fn parse(value: &str) -> Result<Property, TrajError> {
        Ok(Property::VectorXD(parse_floats(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_types() {
        assert_eq!(Property::infer("T"), Property::Bool(true));
        assert_eq!(Property::infer("False"), Property::Bool(false));
        assert_eq!(Property::infer("12"), Property::Int(12));
        assert_eq!(Property::infer("-1.5e2"), Property::Double(-150.0));
        assert_eq!(Property::infer("1 2 3"), Property::Vector3D([1.0, 2.0, 3.0]));
        assert_eq!(Property::infer("1 2 3 4"), Property::VectorXD(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(Property::infer("COBHUW"), Property::String("COBHUW".into()));
        assert_eq!(Property::infer("1 2 x"), Property::String("1 2 x".into()));
    }

    #[test]
    fn matrix_is_row_major() {
        let m = Property::infer("1 2 3 4 5 6 7 8 9");
        let Property::Matrix3x3(m) = m else {
            panic!("expected a matrix");
        };
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(1, 0)], 4.0);
    }

    #[test]
    fn numeric_lookup_widens_integers() {
        let mut props = Properties::new();
        props.insert("i".into(), Property::Int(3));
        props.insert("E".into(), Property::Double(-1.25));
        props.insert("name".into(), Property::String("x".into()));
        assert_eq!(props.get_f64("i"), Some(3.0));
        assert_eq!(props.get_f64("E"), Some(-1.25));
        assert_eq!(props.get_f64("name"), None);
        assert_eq!(props.get_f64("missing"), None);
    }

    #[test]
    #[should_panic(expected = "Invalid boolean value: ok")]
    fn bad_bool() {
        BoolParser::parse("ok").unwrap();
    }
}
