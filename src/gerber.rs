use std::fmt::Write;
use std::str::FromStr;

use log::info;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::aperture::{Aperture, ApertureTable};
use crate::aperture_macro::{ApertureMacro, MacroTable};
use crate::coordinates::{CoordinateFormat, ZeroOmission};
use crate::error::{ParseError, UnparseError};
use crate::geometry::Mirroring;
use crate::layer::{Layer, LayerUnparser};
use crate::parser::Parser;
use crate::units::{Unit, UnitValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImagePolarity {
    #[default]
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    X,
    Y,
}

/// Output axes for the A and B data axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisSelect {
    pub a: Axis,
    pub b: Axis,
}

impl Default for AxisSelect {
    fn default() -> Self {
        Self {
            a: Axis::X,
            b: Axis::Y,
        }
    }
}

/// Values of the deprecated image parameters (`IP`, `IR`, `AS`, `MI`, `OF`, `SF` and `SM`).
///
/// They are kept for inspection, they are not applied to the geometry and are not written by
/// [`Gerber::unparse`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageParameters {
    pub polarity: ImagePolarity,
    /// Degrees, one of 0, 90, 180 or 270.
    pub rotation: u32,
    pub axis_select: AxisSelect,
    pub mirroring: Mirroring,
    pub offset: Option<(UnitValue, UnitValue)>,
    pub scale: (f64, f64),
    pub symbol_mirroring: Mirroring,
}

impl Default for ImageParameters {
    fn default() -> Self {
        Self {
            polarity: ImagePolarity::Positive,
            rotation: 0,
            axis_select: AxisSelect::default(),
            mirroring: Mirroring::default(),
            offset: None,
            scale: (1.0, 1.0),
            symbol_mirroring: Mirroring::default(),
        }
    }
}

/// A parsed or programmatically built Gerber document.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gerber {
    pub(crate) name: Option<String>,
    pub(crate) units: Option<Unit>,
    pub(crate) coordinate_format: Option<CoordinateFormat>,
    pub(crate) zero_omission: Option<ZeroOmission>,
    pub(crate) image_parameters: ImageParameters,
    pub(crate) apertures: ApertureTable,
    pub(crate) macros: MacroTable,
    pub(crate) layers: Vec<Layer>,
}

impl Gerber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn units(&self) -> Option<Unit> {
        self.units
    }

    pub fn set_units(&mut self, units: Unit) {
        self.units = Some(units);
    }

    pub fn coordinate_format(&self) -> Option<CoordinateFormat> {
        self.coordinate_format
    }

    pub fn set_coordinate_format(&mut self, integer_places: u8, decimal_places: u8) {
        self.coordinate_format = Some(CoordinateFormat::new(integer_places, decimal_places));
    }

    pub fn zero_omission(&self) -> Option<ZeroOmission> {
        self.zero_omission
    }

    pub fn set_zero_omission(&mut self, zero_omission: ZeroOmission) {
        self.zero_omission = Some(zero_omission);
    }

    pub fn image_parameters(&self) -> &ImageParameters {
        &self.image_parameters
    }

    pub fn apertures(&self) -> &ApertureTable {
        &self.apertures
    }

    /// Adds `aperture` to the table, returning its D-code number.
    pub fn new_aperture(&mut self, aperture: Aperture) -> usize {
        self.apertures.push(aperture)
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn define_macro(&mut self, aperture_macro: ApertureMacro) {
        self.macros.insert(aperture_macro);
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Appends an empty layer and returns it.
    pub fn new_layer(&mut self) -> &mut Layer {
        let index = self.layers.len();
        self.layers.push(Layer::new());
        &mut self.layers[index]
    }

    /// Writes the document as RS-274X source, with absolute coordinates.
    ///
    /// Apertures used by a layer but missing from the table are numbered after the last defined
    /// aperture.
    #[profiling::function]
    pub fn unparse(&self) -> Result<String, UnparseError> {
        let units = self.units.ok_or(UnparseError::UnitsNotSet)?;
        let zero_omission = self
            .zero_omission
            .ok_or(UnparseError::ZeroOmissionNotSet)?;
        let format = self
            .coordinate_format
            .ok_or(UnparseError::CoordinateFormatNotSet)?;

        let mut apertures = self.apertures.clone();
        let numbers = self
            .layers
            .iter()
            .map(|layer| {
                layer
                    .geometry()
                    .iter()
                    .map(|(aperture, _)| match apertures.number_of(aperture) {
                        Some(number) => number,
                        None => apertures.push(aperture.clone()),
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut out = String::new();
        if let Some(name) = &self.name {
            writeln!(out, "%IN{}*%", name)?;
        }
        writeln!(
            out,
            "%FS{}AX{ip}{dp}Y{ip}{dp}*%",
            zero_omission.code(),
            ip = format.integer_places,
            dp = format.decimal_places
        )?;
        writeln!(out, "%MO{}*%", units.code())?;
        writeln!(out, "%IPPOS*%")?;

        for aperture_macro in self.macros.iter() {
            writeln!(out, "%AM{}*", aperture_macro.name())?;
            writeln!(out, "{}%", aperture_macro.to_lines()?.join("\n"))?;
        }

        for (number, aperture) in apertures.iter() {
            writeln!(out, "%ADD{}{}*%", number, aperture.to_unit(units))?;
        }

        let mut unparser = LayerUnparser::new(format, zero_omission);
        for (layer, numbers) in self.layers.iter().zip(&numbers) {
            unparser.unparse_layer(&mut out, layer, numbers)?;
        }

        writeln!(out, "M02*")?;

        info!(
            "Unparsed gerber. apertures: {}, macros: {}, layers: {}",
            apertures.len(),
            self.macros.len(),
            self.layers.len()
        );
        Ok(out)
    }
}

impl FromStr for Gerber {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Parser::new().parse(input)
    }
}

#[cfg(test)]
mod gerber_tests {
    use rstest::rstest;

    use super::*;
    use crate::aperture_macro::MacroArgument;
    use crate::error::ParseErrorKind;
    use crate::geometry::{Arc, Geometry, Line};
    use crate::layer::Polarity;
    use crate::spacial::Position;

    fn rectangle_path(gerber: &mut Gerber, aperture: &Aperture) {
        let corners = [
            Position::new(0.0, 0.0),
            Position::new(2.5, 0.0),
            Position::new(2.5, 1.5),
            Position::new(0.0, 1.5),
        ];
        let layer = gerber.new_layer();
        for (index, start) in corners.iter().enumerate() {
            let end = corners[(index + 1) % corners.len()];
            layer.add_line(aperture, *start, end);
        }
    }

    fn document() -> Gerber {
        let mut gerber = Gerber::new();
        gerber.set_units(Unit::Millimeter);
        gerber.set_coordinate_format(2, 4);
        gerber.set_zero_omission(ZeroOmission::Leading);
        gerber
    }

    #[test]
    fn unparse_rectangle_path() {
        // given
        let mut gerber = document();
        let aperture = Aperture::circle(UnitValue::millimeter(0.01));
        gerber.new_aperture(aperture.clone());
        rectangle_path(&mut gerber, &aperture);

        // when
        let source = gerber.unparse().unwrap();

        // then
        let expected = [
            "%FSLAX24Y24*%",
            "%MOMM*%",
            "%IPPOS*%",
            "%ADD10C,0.01*%",
            "%LPD*%",
            "D10*",
            "X0Y0D02*",
            "G01X25000D01*",
            "G01Y15000D01*",
            "G01X0D01*",
            "G01Y0D01*",
            "M02*",
        ];
        assert_eq!(source.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn rectangle_path_round_trip() {
        // given
        let mut gerber = document();
        let aperture = Aperture::circle(UnitValue::millimeter(0.01));
        gerber.new_aperture(aperture.clone());
        rectangle_path(&mut gerber, &aperture);

        // when
        let source = gerber.unparse().unwrap();
        let parsed: Gerber = source.parse().unwrap();

        // then
        assert_eq!(parsed.apertures().get(10), Some(&aperture));
        assert_eq!(parsed.layers().len(), 1);
        assert_eq!(parsed.layers()[0].geometry_for(&aperture), gerber.layers()[0].geometry_for(&aperture));
        assert_eq!(parsed.units(), Some(Unit::Millimeter));
        assert_eq!(parsed.coordinate_format(), Some(CoordinateFormat::new(2, 4)));
        assert_eq!(parsed.zero_omission(), Some(ZeroOmission::Leading));
    }

    #[test]
    fn round_trip_with_macros_flashes_and_arcs() {
        // given
        let mut gerber = document();
        gerber.set_name("PANEL");
        let mut aperture_macro = ApertureMacro::new("DONUT");
        let diameter = aperture_macro.variable(1);
        aperture_macro
            .push_primitive(1, vec![
                MacroArgument::Value(1.0),
                MacroArgument::Variable(diameter),
                MacroArgument::Value(0.0),
                MacroArgument::Value(0.0),
            ])
            .unwrap();
        gerber.define_macro(aperture_macro);
        let pad = Aperture::macro_reference("DONUT", vec![0.5]);
        let trace = Aperture::rectangle(UnitValue::millimeter(0.1), UnitValue::millimeter(0.2));
        gerber.new_aperture(pad.clone());

        let top = gerber.new_layer();
        top.name = Some("TOP".to_string());
        top.add_point(&pad, Position::new(1.0, 1.0));
        top.add_arc(
            &trace,
            Arc::new(Position::new(1.0, 0.0), Position::new(2.0, 0.0), Position::new(0.0, 0.0)),
        );
        top.add_point(&pad, Position::new(3.0, 1.0));
        let clear = gerber.new_layer();
        clear.polarity = Polarity::Clear;
        clear.add_line(&trace, Position::new(0.0, 0.0), Position::new(0.0, 2.0));

        // when
        let source = gerber.unparse().unwrap();
        let parsed: Gerber = source.parse().unwrap();

        // then
        assert_eq!(parsed.name(), Some("PANEL"));
        assert_eq!(parsed.macros(), gerber.macros());
        assert_eq!(parsed.apertures().get(10), Some(&pad));
        assert_eq!(parsed.apertures().get(11), Some(&trace));
        assert_eq!(parsed.layers().len(), 2);
        assert_eq!(parsed.layers()[0].name.as_deref(), Some("TOP"));
        assert_eq!(parsed.layers()[0].geometry_for(&pad), Some(&[
            Geometry::Point(Position::new(1.0, 1.0)),
            Geometry::Point(Position::new(3.0, 1.0)),
        ][..]));
        assert_eq!(parsed.layers()[0].geometry_for(&trace), gerber.layers()[0].geometry_for(&trace));
        assert_eq!(parsed.layers()[1].polarity, Polarity::Clear);
        assert_eq!(parsed.layers()[1].geometry_for(&trace), Some(&[Geometry::Line(Line::new(
            Position::new(0.0, 0.0),
            Position::new(0.0, 2.0)
        ))][..]));
    }

    #[test]
    fn flashes_at_the_current_position_round_trip() {
        // given
        let mut gerber = document();
        let trace = Aperture::circle(UnitValue::millimeter(0.1));
        let pad = Aperture::circle(UnitValue::millimeter(0.5));
        let layer = gerber.new_layer();
        layer.add_line(&trace, Position::new(0.0, 0.0), Position::new(1.0, 1.0));
        layer.add_point(&pad, Position::new(1.0, 1.0));
        layer.add_point(&pad, Position::new(1.0, 1.0));

        // when
        let source = gerber.unparse().unwrap();
        let parsed: Gerber = source.parse().unwrap();

        // then
        assert!(source.contains("D11*\nX10000D03*\nX10000D03*\n"));
        assert_eq!(parsed.layers()[0].geometry_for(&pad), Some(&[
            Geometry::Point(Position::new(1.0, 1.0)),
            Geometry::Point(Position::new(1.0, 1.0)),
        ][..]));
        assert_eq!(parsed.layers()[0].geometry_for(&trace), gerber.layers()[0].geometry_for(&trace));
    }

    #[test]
    fn unparse_rejects_coordinates_wider_than_the_format() {
        // given
        let mut gerber = document();
        let aperture = Aperture::circle(UnitValue::millimeter(0.1));
        gerber
            .new_layer()
            .add_point(&aperture, Position::new(123.0, 1.0));

        // expect
        assert_eq!(
            gerber.unparse(),
            Err(UnparseError::CoordinateOutOfRange {
                value: 123.0,
                integer_places: 2
            })
        );
    }

    #[test]
    fn unparse_rejects_unbound_macro_variables() {
        // given
        let mut gerber = document();
        let mut aperture_macro = ApertureMacro::new("PAD");
        let diameter = aperture_macro.variable(1);
        aperture_macro
            .push_primitive(1, vec![
                MacroArgument::Value(1.0),
                MacroArgument::Variable(diameter),
                MacroArgument::Value(0.0),
                MacroArgument::Value(0.0),
            ])
            .unwrap();
        aperture_macro.set_modifiers(vec![]);
        gerber.define_macro(aperture_macro);

        // expect
        assert_eq!(gerber.unparse(), Err(UnparseError::UnboundMacroVariable("PAD".to_string())));
    }

    #[test]
    fn unparse_writes_apertures_in_document_units() {
        // given
        let mut gerber = document();
        let aperture = Aperture::rectangle(UnitValue::inch(1.0), UnitValue::inch(0.5));
        gerber.new_aperture(aperture);

        // when
        let source = gerber.unparse().unwrap();
        let parsed: Gerber = source.parse().unwrap();

        // then
        assert!(source.contains("%ADD10R,25.4X12.7*%\n"));
        assert_eq!(
            parsed.apertures().get(10),
            Some(&Aperture::rectangle(UnitValue::millimeter(25.4), UnitValue::millimeter(12.7)))
        );
    }

    #[test]
    fn unparse_numbers_apertures_missing_from_table() {
        // given
        let mut gerber = document();
        let aperture = Aperture::obround(UnitValue::millimeter(0.5), UnitValue::millimeter(0.25));
        gerber
            .new_layer()
            .add_point(&aperture, Position::new(1.0, 2.0));

        // when
        let source = gerber.unparse().unwrap();

        // then
        assert!(source.contains("%ADD10O,0.5X0.25*%\n"));
        assert!(source.contains("D10*\nX10000Y20000D03*\n"));
        assert!(gerber.apertures().is_empty());
    }

    #[test]
    fn unparse_requires_units() {
        // given
        let mut gerber = Gerber::new();
        gerber.set_coordinate_format(2, 4);
        gerber.set_zero_omission(ZeroOmission::Leading);

        // expect
        assert!(matches!(gerber.unparse(), Err(UnparseError::UnitsNotSet)));
    }

    #[test]
    fn unparse_requires_zero_omission() {
        // given
        let mut gerber = Gerber::new();
        gerber.set_units(Unit::Inch);
        gerber.set_coordinate_format(2, 4);

        // expect
        assert!(matches!(gerber.unparse(), Err(UnparseError::ZeroOmissionNotSet)));
    }

    #[test]
    fn unparse_requires_coordinate_format() {
        // given
        let mut gerber = Gerber::new();
        gerber.set_units(Unit::Inch);
        gerber.set_zero_omission(ZeroOmission::Trailing);

        // expect
        assert!(matches!(gerber.unparse(), Err(UnparseError::CoordinateFormatNotSet)));
    }

    #[rstest]
    #[case(ZeroOmission::Leading, Unit::Inch, "%FSLAX36Y36*%\n%MOIN*%\n")]
    #[case(ZeroOmission::Trailing, Unit::Millimeter, "%FSTAX36Y36*%\n%MOMM*%\n")]
    fn unparse_header(#[case] zero_omission: ZeroOmission, #[case] units: Unit, #[case] expected: &str) {
        // given
        let mut gerber = Gerber::new();
        gerber.set_units(units);
        gerber.set_coordinate_format(3, 6);
        gerber.set_zero_omission(zero_omission);

        // when
        let source = gerber.unparse().unwrap();

        // then
        assert!(source.starts_with(expected));
        assert!(source.ends_with("%IPPOS*%\nM02*\n"));
    }

    #[test]
    fn new_aperture_numbers_start_at_ten() {
        // given
        let mut gerber = Gerber::new();

        // when
        let first = gerber.new_aperture(Aperture::circle(UnitValue::inch(0.01)));
        let second = gerber.new_aperture(Aperture::circle(UnitValue::inch(0.02)));

        // then
        assert_eq!((first, second), (10, 11));
    }

    #[test]
    fn from_str_reports_data_after_end_of_file() {
        // when
        let result = "%FSLAX24Y24*%%MOIN*%M02*D01*".parse::<Gerber>();

        // then
        let error = result.unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::UnexpectedDataAfterEof);
        assert_eq!(error.block.as_deref(), Some("D01*"));
    }
}
