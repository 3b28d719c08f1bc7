use std::fmt::Write;

use super::Layer;
use crate::coordinates::{CoordinateFormat, ZeroOmission};
use crate::error::UnparseError;
use crate::geometry::{Arc, Geometry};
use crate::spacial::Position;

/// Writes layer geometry as function code blocks.
///
/// Tracks the position and interpolation mode of the reader so that unchanged coordinates can
/// be omitted, the state carries over from one layer to the next.
#[derive(Debug, Clone)]
pub struct LayerUnparser {
    format: CoordinateFormat,
    zero_omission: ZeroOmission,
    position: Option<Position>,
    interpolation: Option<u32>,
    multi_quadrant: bool,
}

impl LayerUnparser {
    pub fn new(format: CoordinateFormat, zero_omission: ZeroOmission) -> Self {
        Self {
            format,
            zero_omission,
            position: None,
            interpolation: None,
            multi_quadrant: false,
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = Some(position);
    }

    pub fn format_coordinate(&self, value: f64) -> Result<String, UnparseError> {
        self.format
            .encode(value, self.zero_omission)
    }

    /// A linear block to `(x, y)`, omitting each coordinate that matches the current position.
    ///
    /// A bare `D0n*` only sets the draw mode, so X is kept when both coordinates match.
    pub fn format_g1(&mut self, x: f64, y: f64, dcode: u32) -> Result<String, UnparseError> {
        let mut block = String::new();

        if dcode == 1 || matches!(self.interpolation, Some(2) | Some(3)) {
            block.push_str("G01");
            self.interpolation = Some(1);
        }

        let position = self.position;
        let write_y = position.map_or(true, |position| position.y != y);
        let write_x = !write_y || position.map_or(true, |position| position.x != x);
        if write_x {
            block.push('X');
            block.push_str(&self.format_coordinate(x)?);
        }
        if write_y {
            block.push('Y');
            block.push_str(&self.format_coordinate(y)?);
        }

        block.push_str(&format!("D0{}*", dcode));
        self.position = Some(Position::new(x, y));
        Ok(block)
    }

    /// A counterclockwise block from the current position along `arc`.
    ///
    /// The center is written as a signed offset from the arc start, which is only valid in
    /// multi-quadrant mode.
    pub fn format_g3(&mut self, arc: &Arc) -> Result<String, UnparseError> {
        let offset = arc.center_offset();
        let block = format!(
            "G03X{}Y{}I{}J{}D01*",
            self.format_coordinate(arc.end.x)?,
            self.format_coordinate(arc.end.y)?,
            self.format_coordinate(offset.x)?,
            self.format_coordinate(offset.y)?,
        );
        self.position = Some(arc.end);
        self.interpolation = Some(3);
        Ok(block)
    }

    fn move_to(&mut self, out: &mut String, target: Position) -> Result<(), UnparseError> {
        if self.position != Some(target) {
            let block = self.format_g1(target.x, target.y, 2)?;
            writeln!(out, "{}", block)?;
        }
        Ok(())
    }

    /// Writes the blocks for `elements`, drawn with aperture `number`.
    pub fn unparse_elements(&mut self, out: &mut String, number: usize, elements: &[Geometry]) -> Result<(), UnparseError> {
        writeln!(out, "D{}*", number)?;

        for element in elements {
            match element {
                Geometry::Line(line) => {
                    self.move_to(out, line.start)?;
                    let block = self.format_g1(line.end.x, line.end.y, 1)?;
                    writeln!(out, "{}", block)?;
                }
                Geometry::Point(position) => {
                    let block = self.format_g1(position.x, position.y, 3)?;
                    writeln!(out, "{}", block)?;
                }
                Geometry::Arc(arc) => {
                    self.move_to(out, arc.start)?;
                    if !self.multi_quadrant {
                        writeln!(out, "G75*")?;
                        self.multi_quadrant = true;
                    }
                    let block = self.format_g3(arc)?;
                    writeln!(out, "{}", block)?;
                }
            }
        }
        Ok(())
    }

    /// Writes the layer header and each aperture's geometry, `numbers` gives the aperture
    /// number for each entry of [`Layer::geometry`].
    pub fn unparse_layer(&mut self, out: &mut String, layer: &Layer, numbers: &[usize]) -> Result<(), UnparseError> {
        self.multi_quadrant = false;

        if let Some(name) = &layer.name {
            writeln!(out, "%LN{}*%", name)?;
        }
        writeln!(out, "%LP{}*%", layer.polarity.code())?;

        for ((_aperture, elements), number) in layer
            .geometry()
            .iter()
            .zip(numbers)
        {
            self.unparse_elements(out, *number, elements)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod layer_unparser_tests {
    use rstest::rstest;

    use super::*;
    use crate::aperture::Aperture;
    use crate::geometry::Line;
    use crate::layer::Polarity;
    use crate::units::UnitValue;

    fn unparser() -> LayerUnparser {
        let mut unparser = LayerUnparser::new(CoordinateFormat::new(2, 6), ZeroOmission::Leading);
        unparser.set_position(Position::new(1.0, 2.0));
        unparser
    }

    #[rstest]
    #[case(1.0, 3.0, 1, "G01Y3000000D01*")]
    #[case(3.0, 2.0, 1, "G01X3000000D01*")]
    #[case(1.0, 2.0, 1, "G01X1000000D01*")]
    #[case(1.0, 3.0, 2, "Y3000000D02*")]
    #[case(3.0, 2.0, 3, "X3000000D03*")]
    #[case(1.0, 2.0, 2, "X1000000D02*")]
    #[case(1.0, 2.0, 3, "X1000000D03*")]
    fn format_g1(#[case] x: f64, #[case] y: f64, #[case] dcode: u32, #[case] expected: &str) {
        // given
        let mut unparser = unparser();

        // when
        let block = unparser.format_g1(x, y, dcode);

        // then
        assert_eq!(block, Ok(expected.to_string()));
        assert_eq!(unparser.position(), Some(Position::new(x, y)));
    }

    #[test]
    fn format_g1_without_position_writes_both_coordinates() {
        let mut unparser = LayerUnparser::new(CoordinateFormat::new(2, 6), ZeroOmission::Leading);

        assert_eq!(unparser.format_g1(0.0, 0.5, 2), Ok("X0Y500000D02*".to_string()));
    }

    #[test]
    fn format_g1_out_of_range() {
        let mut unparser = unparser();

        assert_eq!(
            unparser.format_g1(100.0, 2.0, 1),
            Err(UnparseError::CoordinateOutOfRange {
                value: 100.0,
                integer_places: 2
            })
        );
    }

    #[test]
    fn moves_after_arcs_are_prefixed() {
        // given
        let mut unparser = unparser();
        let arc = Arc::new(Position::new(1.0, 3.0), Position::new(1.0, 2.0), Position::new(2.0, 3.0));
        unparser.format_g3(&arc).unwrap();

        // when
        let block = unparser.format_g1(5.0, 5.0, 2);

        // then
        assert_eq!(block, Ok("G01X5000000Y5000000D02*".to_string()));
    }

    #[test]
    fn format_g3() {
        // given
        let mut unparser = unparser();
        let arc = Arc::new(Position::new(1.0, 3.0), Position::new(1.0, 2.0), Position::new(2.0, 3.0));

        // when
        let block = unparser.format_g3(&arc);

        // then
        assert_eq!(block, Ok("G03X2000000Y3000000I0J1000000D01*".to_string()));
        assert_eq!(unparser.position(), Some(Position::new(2.0, 3.0)));
    }

    #[test]
    fn unparse_layer() {
        // given
        let mut unparser = LayerUnparser::new(CoordinateFormat::new(2, 4), ZeroOmission::Leading);
        let aperture = Aperture::circle(UnitValue::millimeter(0.01));
        let mut layer = Layer::new();
        layer.name = Some("COPPER".to_string());
        layer.polarity = Polarity::Clear;
        layer.add_line(&aperture, Position::new(0.0, 0.0), Position::new(1.0, 0.0));
        layer.add_line(&aperture, Position::new(1.0, 0.0), Position::new(1.0, 1.0));
        layer.add_point(&aperture, Position::new(2.0, 2.0));
        layer.add_arc(
            &aperture,
            Arc::new(Position::new(2.0, 1.0), Position::new(2.0, 2.0), Position::new(1.0, 1.0)),
        );

        // when
        let mut out = String::new();
        unparser
            .unparse_layer(&mut out, &layer, &[10])
            .unwrap();

        // then
        let expected = [
            "%LNCOPPER*%",
            "%LPC*%",
            "D10*",
            "X0Y0D02*",
            "G01X10000D01*",
            "G01Y10000D01*",
            "X20000Y20000D03*",
            "G75*",
            "G03X10000Y10000I0J-10000D01*",
        ];
        assert_eq!(out.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn connected_lines_skip_moves() {
        // given
        let mut unparser = LayerUnparser::new(CoordinateFormat::new(2, 4), ZeroOmission::Leading);
        unparser.set_position(Position::new(0.0, 0.0));
        let elements = [
            Geometry::Line(Line::new(Position::new(0.0, 0.0), Position::new(0.0, 1.0))),
            Geometry::Line(Line::new(Position::new(0.0, 1.0), Position::new(1.0, 1.0))),
        ];

        // when
        let mut out = String::new();
        unparser
            .unparse_elements(&mut out, 11, &elements)
            .unwrap();

        // then
        assert_eq!(out, "D11*\nG01Y10000D01*\nG01X10000D01*\n");
    }

    #[test]
    fn flashes_at_the_current_position_keep_a_coordinate() {
        // given
        let mut unparser = LayerUnparser::new(CoordinateFormat::new(2, 4), ZeroOmission::Leading);
        let elements = [
            Geometry::Line(Line::new(Position::new(0.0, 0.0), Position::new(1.0, 1.0))),
            Geometry::Point(Position::new(1.0, 1.0)),
            Geometry::Point(Position::new(1.0, 1.0)),
        ];

        // when
        let mut out = String::new();
        unparser
            .unparse_elements(&mut out, 10, &elements)
            .unwrap();

        // then
        assert_eq!(out, "D10*\nX0Y0D02*\nG01X10000Y10000D01*\nX10000D03*\nX10000D03*\n");
    }
}
