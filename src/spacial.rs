pub type Vector = nalgebra::Vector2<f64>;
pub type Position = nalgebra::Point2<f64>;
pub type Size = nalgebra::Vector2<f64>;

/// Per-component sign, zero stays zero.
///
/// Used when forcing the signs of single-quadrant arc offsets.
pub trait Signum {
    fn signum_or_zero(self) -> Self;
}

impl Signum for f64 {
    fn signum_or_zero(self) -> Self {
        if self > 0.0 {
            1.0
        } else if self < 0.0 {
            -1.0
        } else {
            0.0
        }
    }
}

impl Signum for Vector {
    fn signum_or_zero(self) -> Self {
        Self::new(self.x.signum_or_zero(), self.y.signum_or_zero())
    }
}

#[cfg(test)]
mod signum_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(4.0, 1.0)]
    #[case(-0.001, -1.0)]
    #[case(0.0, 0.0)]
    #[case(-0.0, 0.0)]
    fn signum_or_zero(#[case] value: f64, #[case] expected: f64) {
        assert_eq!(value.signum_or_zero(), expected);
    }

    #[test]
    fn vector_signum() {
        // given
        let vector = Vector::new(-4.0, 0.0);

        // expect
        assert_eq!(vector.signum_or_zero(), Vector::new(-1.0, 0.0));
    }
}
