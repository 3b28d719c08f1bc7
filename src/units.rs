use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::ops::{Add, Mul, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const MILLIMETERS_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Unit {
    Inch,
    Millimeter,
}

impl Unit {
    /// The `MO` directive argument.
    pub fn code(&self) -> &'static str {
        match self {
            Unit::Inch => "IN",
            Unit::Millimeter => "MM",
        }
    }
}

/// A length tagged with the unit it was specified in.
///
/// Arithmetic between two values converts the right-hand side into the unit of the left-hand side.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnitValue {
    value: f64,
    unit: Unit,
}

impl UnitValue {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self {
            value,
            unit,
        }
    }

    pub fn inch(value: f64) -> Self {
        Self::new(value, Unit::Inch)
    }

    pub fn millimeter(value: f64) -> Self {
        Self::new(value, Unit::Millimeter)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn to(&self, unit: Unit) -> Self {
        let value = match (self.unit, unit) {
            (Unit::Inch, Unit::Millimeter) => self.value * MILLIMETERS_PER_INCH,
            (Unit::Millimeter, Unit::Inch) => self.value / MILLIMETERS_PER_INCH,
            _ => self.value,
        };
        Self::new(value, unit)
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

impl Display for UnitValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl PartialOrd for UnitValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value
            .partial_cmp(&other.to(self.unit).value)
    }
}

impl Add for UnitValue {
    type Output = UnitValue;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.value + rhs.to(self.unit).value, self.unit)
    }
}

impl Sub for UnitValue {
    type Output = UnitValue;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.value - rhs.to(self.unit).value, self.unit)
    }
}

impl Neg for UnitValue {
    type Output = UnitValue;

    fn neg(self) -> Self::Output {
        Self::new(-self.value, self.unit)
    }
}

impl Mul<f64> for UnitValue {
    type Output = UnitValue;

    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.value * rhs, self.unit)
    }
}

#[cfg(test)]
mod unit_value_tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn conversion() {
        // given
        let value = UnitValue::inch(1.0);

        // when
        let converted = value.to(Unit::Millimeter);

        // then
        assert_eq!(converted, UnitValue::millimeter(25.4));
        assert_eq!(converted.to(Unit::Inch), value);
    }

    #[test]
    fn mixed_unit_arithmetic_uses_left_hand_unit() {
        let sum = UnitValue::millimeter(1.0) + UnitValue::inch(1.0);
        assert_eq!(sum, UnitValue::millimeter(26.4));
    }

    #[rstest]
    #[case(UnitValue::millimeter(0.01), "0.01")]
    #[case(UnitValue::inch(12.0), "12")]
    #[case(UnitValue::inch(-0.5), "-0.5")]
    fn display_renders_bare_number(#[case] value: UnitValue, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn ordering() {
        assert!(UnitValue::millimeter(1.0) < UnitValue::millimeter(2.0));
        assert!(UnitValue::inch(1.0) > UnitValue::millimeter(25.0));
    }
}
