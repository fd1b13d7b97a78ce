use crate::{
    constants::{FIELDS_PER_LINE, FIELD_SEPARATOR},
    error::{Error, Result},
};
use serde::Serializer;
use serde_derive::Serialize;
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// A position in space paired with a mass. This is the atomic unit of the
/// whole computation: input lines parse into `MassPoint`s and the reduction
/// folds pairs of them until a single one is left.
///
/// Fields are private so a point can't be changed after construction; every
/// operation hands back a new value.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct MassPoint {
    #[serde(serialize_with = "finite_or_string")]
    x: f64,
    #[serde(serialize_with = "finite_or_string")]
    y: f64,
    #[serde(serialize_with = "finite_or_string")]
    z: f64,
    #[serde(serialize_with = "finite_or_string")]
    mass: f64,
}

/// JSON has no NaN or infinity, so those are written as the same strings the
/// text report prints instead of `null`.
fn finite_or_string<S: Serializer>(
    value: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.collect_str(value)
    }
}

impl MassPoint {
    pub const fn new(x: f64, y: f64, z: f64, mass: f64) -> Self {
        MassPoint { x, y, z, mass }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// True when all three coordinates and the mass are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.mass.is_finite()
    }

    /// Maps the point into the weighted subspace, where the coordinates are
    /// premultiplied by the mass. A plain sum in this space is a weighted sum
    /// of positions.
    pub fn to_weighted_subspace(self) -> Self {
        MassPoint::new(
            self.x * self.mass,
            self.y * self.mass,
            self.z * self.mass,
            self.mass,
        )
    }

    /// Inverse of [`to_weighted_subspace`](Self::to_weighted_subspace).
    /// A zero mass yields NaN or infinite coordinates.
    pub fn from_weighted_subspace(self) -> Self {
        MassPoint::new(
            self.x / self.mass,
            self.y / self.mass,
            self.z / self.mass,
            self.mass,
        )
    }

    /// Combines two points into their barycenter: the masses are summed and
    /// the position is the mass-weighted average of both positions,
    /// `(a.x * a.mass + b.x * b.mass) / (a.mass + b.mass)` per coordinate.
    ///
    /// This is unguarded. If the two masses cancel out the coordinates are
    /// NaN; see [`try_combine`](Self::try_combine).
    pub fn combine(self, other: MassPoint) -> MassPoint {
        (self.to_weighted_subspace() + other.to_weighted_subspace()).from_weighted_subspace()
    }

    /// Same as [`combine`](Self::combine) but refuses a zero or non-finite
    /// total mass instead of dividing by it, and a result whose weighted
    /// coordinates overflowed.
    pub fn try_combine(self, other: MassPoint) -> Result<MassPoint> {
        let mass = self.mass + other.mass;
        if mass == 0.0 || !mass.is_finite() {
            return Err(Error::DegenerateMass { a: self, b: other });
        }
        let combined = self.combine(other);
        if !combined.is_finite() {
            return Err(Error::NonFinitePosition { a: self, b: other });
        }
        Ok(combined)
    }
}

/// Component-wise sum, mass included.
impl Add for MassPoint {
    type Output = MassPoint;

    fn add(self, rhs: MassPoint) -> MassPoint {
        MassPoint::new(
            self.x + rhs.x,
            self.y + rhs.y,
            self.z + rhs.z,
            self.mass + rhs.mass,
        )
    }
}

impl fmt::Display for MassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.6}) with mass {:.6}",
            self.x, self.y, self.z, self.mass
        )
    }
}

/// Why a line was not a valid `x:y:z:mass` record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseMassPointError {
    #[error("expected 4 colon-separated fields, found {0}")]
    FieldCount(usize),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}

/// Parses one `x:y:z:mass` record. The line terminator and whitespace around
/// each field are ignored; every field must be a finite decimal number.
impl FromStr for MassPoint {
    type Err = ParseMassPointError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);

        let count = line.split(FIELD_SEPARATOR).count();
        if count != FIELDS_PER_LINE {
            return Err(ParseMassPointError::FieldCount(count));
        }

        let mut values = [0.0; FIELDS_PER_LINE];
        for (value, field) in values.iter_mut().zip(line.split(FIELD_SEPARATOR)) {
            *value = parse_field(field)?;
        }

        let [x, y, z, mass] = values;
        Ok(MassPoint::new(x, y, z, mass))
    }
}

fn parse_field(field: &str) -> std::result::Result<f64, ParseMassPointError> {
    match field.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseMassPointError::InvalidNumber(field.to_string())),
    }
}

#[test]
fn test_parse_simple_line() {
    let point: MassPoint = "1:2:3:4\n".parse().unwrap();
    assert_eq!(point, MassPoint::new(1.0, 2.0, 3.0, 4.0));
}

#[test]
fn test_parse_signed_fractional_and_exponent() {
    let point: MassPoint = "-1.5:+2.25:3e2:0.5\r\n".parse().unwrap();
    assert_eq!(point, MassPoint::new(-1.5, 2.25, 300.0, 0.5));
}

#[test]
fn test_parse_ignores_whitespace_around_fields() {
    let point: MassPoint = " 1 : 2:\t3 :4 ".parse().unwrap();
    assert_eq!(point, MassPoint::new(1.0, 2.0, 3.0, 4.0));
}

#[test]
fn test_parse_rejects_wrong_field_count() {
    assert_eq!(
        "1:2:3".parse::<MassPoint>(),
        Err(ParseMassPointError::FieldCount(3))
    );
    assert_eq!(
        "1:2:3:4:5".parse::<MassPoint>(),
        Err(ParseMassPointError::FieldCount(5))
    );
    assert_eq!(
        "garbage\n".parse::<MassPoint>(),
        Err(ParseMassPointError::FieldCount(1))
    );
    assert_eq!("".parse::<MassPoint>(), Err(ParseMassPointError::FieldCount(1)));
}

#[test]
fn test_parse_rejects_non_numeric_and_trailing_garbage() {
    assert!("1:2:x:4".parse::<MassPoint>().is_err());
    assert!("1:2:3:4kg".parse::<MassPoint>().is_err());
    assert!("1:2::4".parse::<MassPoint>().is_err());
}

#[test]
fn test_parse_rejects_non_finite_values() {
    assert!("inf:0:0:1".parse::<MassPoint>().is_err());
    assert!("0:0:0:NaN".parse::<MassPoint>().is_err());
    assert!("1e400:0:0:1".parse::<MassPoint>().is_err());
}

#[test]
fn test_weighted_subspace_round_trip() {
    let point = MassPoint::new(1.0, -2.0, 4.0, 2.0);
    let weighted = point.to_weighted_subspace();
    assert_eq!(weighted, MassPoint::new(2.0, -4.0, 8.0, 2.0));
    assert_eq!(weighted.from_weighted_subspace(), point);
}

#[test]
fn test_combine_equal_masses_is_midpoint() {
    let a = MassPoint::new(0.0, 0.0, 0.0, 1.0);
    let b = MassPoint::new(2.0, 0.0, 0.0, 1.0);
    assert_eq!(a.combine(b), MassPoint::new(1.0, 0.0, 0.0, 2.0));
}

#[test]
fn test_combine_pulls_toward_heavier_point() {
    let a = MassPoint::new(0.0, 0.0, 0.0, 3.0);
    let b = MassPoint::new(4.0, 8.0, -4.0, 1.0);
    assert_eq!(a.combine(b), MassPoint::new(1.0, 2.0, -1.0, 4.0));
}

#[test]
fn test_combine_is_commutative() {
    let a = MassPoint::new(0.3, -1.7, 2.9, 0.25);
    let b = MassPoint::new(-5.5, 3.1, 0.7, 7.5);
    assert_eq!(a.combine(b), b.combine(a));
}

#[test]
fn test_combine_zero_total_mass_is_nan() {
    let a = MassPoint::new(1.0, 1.0, 1.0, 1.0);
    let b = MassPoint::new(2.0, 2.0, 2.0, -1.0);
    let c = a.combine(b);
    assert_eq!(c.mass(), 0.0);
    assert!(!c.is_finite());
}

#[test]
fn test_try_combine_rejects_zero_total_mass() {
    let a = MassPoint::new(1.0, 1.0, 1.0, 1.0);
    let b = MassPoint::new(2.0, 2.0, 2.0, -1.0);
    assert!(matches!(a.try_combine(b), Err(Error::DegenerateMass { .. })));

    let zero = MassPoint::default();
    assert!(zero.try_combine(zero).is_err());
}

#[test]
fn test_try_combine_rejects_overflowing_coordinates() {
    let a = MassPoint::new(1e300, 0.0, 0.0, 1e10);
    let b = MassPoint::new(-1e300, 0.0, 0.0, 1e10);
    assert!(!a.combine(b).is_finite());
    assert!(matches!(
        a.try_combine(b),
        Err(Error::NonFinitePosition { .. })
    ));
}

#[test]
fn test_serialize_non_finite_as_string() {
    let point = MassPoint::new(f64::NAN, f64::INFINITY, 1.5, 0.0);
    let json: serde_json::Value = serde_json::to_value(point).unwrap();
    assert_eq!(json["x"], "NaN");
    assert_eq!(json["y"], "inf");
    assert_eq!(json["z"], 1.5);
    assert_eq!(json["mass"], 0.0);
}

#[test]
fn test_try_combine_matches_combine() {
    let a = MassPoint::new(1.0, 2.0, 3.0, 4.0);
    let b = MassPoint::new(5.0, 6.0, 7.0, 8.0);
    assert_eq!(a.try_combine(b).unwrap(), a.combine(b));
}

#[test]
fn test_display() {
    let point = MassPoint::new(1.0, 0.5, -2.0, 4.0);
    assert_eq!(
        point.to_string(),
        "(1.000000, 0.500000, -2.000000) with mass 4.000000"
    );
}
