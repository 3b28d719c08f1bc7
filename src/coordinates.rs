#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseErrorKind, UnparseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ZeroOmission {
    Leading,
    Trailing,
}

impl ZeroOmission {
    /// The `FS` directive letter.
    pub fn code(&self) -> char {
        match self {
            ZeroOmission::Leading => 'L',
            ZeroOmission::Trailing => 'T',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoordinateFormat {
    pub integer_places: u8,
    pub decimal_places: u8,
}

impl CoordinateFormat {
    pub fn new(integer_places: u8, decimal_places: u8) -> Self {
        Self {
            integer_places,
            decimal_places,
        }
    }

    pub fn total_places(&self) -> usize {
        self.integer_places as usize + self.decimal_places as usize
    }

    /// Decodes a signed digit string with an implied decimal point.
    pub fn decode(&self, digits: &str, zero_omission: ZeroOmission) -> Result<f64, ParseErrorKind> {
        let (sign, unsigned) = match digits.as_bytes().first() {
            Some(b'-') => ("-", &digits[1..]),
            Some(b'+') => ("", &digits[1..]),
            _ => ("", digits),
        };

        if unsigned.is_empty() || !unsigned.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ParseErrorKind::InvalidCoordinate(digits.to_string()));
        }

        let width = self.total_places();
        let padded = match zero_omission {
            ZeroOmission::Leading => format!("{:0>width$}", unsigned),
            ZeroOmission::Trailing => format!("{:0<width$}", unsigned),
        };

        let (integer, decimal) = padded.split_at(self.integer_places as usize);
        let text = match decimal.is_empty() {
            true => format!("{}{}", sign, integer),
            false => format!("{}{}.{}", sign, integer, decimal),
        };

        text.parse::<f64>()
            .map_err(|_| ParseErrorKind::InvalidCoordinate(digits.to_string()))
    }

    /// Encodes `value` as a fixed-point digit string with the omitted zeros removed, zero is `"0"`.
    ///
    /// Fails when the integer part needs more than `integer_places` digits.
    pub fn encode(&self, value: f64, zero_omission: ZeroOmission) -> Result<String, UnparseError> {
        let width = self.total_places();
        let fixed = format!("{:.*}", self.decimal_places as usize, value.abs());
        let digits: String = fixed
            .chars()
            .filter(|c| *c != '.')
            .collect();
        if digits.trim_start_matches('0').len() > width {
            return Err(UnparseError::CoordinateOutOfRange {
                value,
                integer_places: self.integer_places,
            });
        }
        let digits = format!("{:0>width$}", digits);

        let significant = match zero_omission {
            ZeroOmission::Leading => digits.trim_start_matches('0'),
            ZeroOmission::Trailing => digits.trim_end_matches('0'),
        };

        let encoded = match (significant.is_empty(), value < 0.0) {
            (true, _) => "0".to_string(),
            (false, true) => format!("-{}", significant),
            (false, false) => significant.to_string(),
        };
        Ok(encoded)
    }
}
