use std::io::Read;
use std::str::FromStr;

use lazy_regex::*;
use log::{debug, info, trace, warn};
use regex::{Captures, Regex};

use crate::aperture::{Aperture, ApertureTable};
use crate::aperture_macro::{MacroArgument, MacroTable};
use crate::coordinates::{CoordinateFormat, ZeroOmission};
use crate::error::{ParseError, ParseErrorKind};
use crate::geometry::Mirroring;
use crate::gerber::{Axis, AxisSelect, Gerber, ImageParameters, ImagePolarity};
use crate::layer::{CoordinateMode, LayerParser, Polarity};
use crate::spacial::Vector;
use crate::units::{Unit, UnitValue};

static RE_PARAMETER: Lazy<Regex> = lazy_regex!(r"^[A-Z]{2}");

static RE_DCODE: Lazy<Regex> = lazy_regex!(r"^D(\d+)\*?$");
static RE_MCODE: Lazy<Regex> = lazy_regex!(r"^M(\d+)\*?$");
static RE_COMMENT: Lazy<Regex> = lazy_regex!(r"^G0?4(?:[^0-9]|$)");
static RE_G54: Lazy<Regex> = lazy_regex!(r"^G54D(\d+)\*?$");
static RE_UNITS_GCODE: Lazy<Regex> = lazy_regex!(r"^G7([01])\*?$");
static RE_COORDINATES: Lazy<Regex> = lazy_regex!(
    r"^(?:G(\d{1,2}))?(?:X([+-]?\d+))?(?:Y([+-]?\d+))?(?:I([+-]?\d+))?(?:J([+-]?\d+))?(?:D0*([123]))?\*?$"
);

static RE_FORMAT_SPECIFICATION: Lazy<Regex> =
    lazy_regex!(r"^FS(L|T)(A|I)(?:N\d)?(?:G\d)?X(\d)(\d)Y(\d)(\d)(?:D\d)?(?:M\d)?\*?$");
static RE_MODE: Lazy<Regex> = lazy_regex!(r"^MO(IN|MM)\*?$");
static RE_APERTURE_DEFINITION: Lazy<Regex> = lazy_regex!(r"^ADD(\d+)([A-Za-z_.$][\w.$]*)(?:,\s?([^*]*))?\*?$");
static RE_MACRO_DEFINITION: Lazy<Regex> = lazy_regex!(r"^\$(\d+)\s*=\s*(.*)$");
static RE_MACRO_COMMENT: Lazy<Regex> = lazy_regex!(r"^0(?:\s+(.*))?$");
static RE_MACRO_VARIABLE: Lazy<Regex> = lazy_regex!(r"^\$(\d+)$");
static RE_LAYER_NAME: Lazy<Regex> = lazy_regex!(r"^LN([^*]+)\*?$");
static RE_LAYER_POLARITY: Lazy<Regex> = lazy_regex!(r"^LP(C|D)\*?$");
static RE_STEP_AND_REPEAT: Lazy<Regex> =
    lazy_regex!(r"^SR(?:X(\d+))?(?:Y(\d+))?(?:I([\d.+-]+))?(?:J([\d.+-]+))?\*?$");
static RE_IMAGE_NAME: Lazy<Regex> = lazy_regex!(r"^IN([A-Za-z0-9_]+)\*?$");
static RE_IMAGE_POLARITY: Lazy<Regex> = lazy_regex!(r"^IP(POS|NEG)\*?$");
static RE_IMAGE_ROTATION: Lazy<Regex> = lazy_regex!(r"^IR(0|90|180|270)\*?$");
static RE_AXIS_SELECT: Lazy<Regex> = lazy_regex!(r"^AS(?:A(X|Y))?(?:B(X|Y))?\*?$");
static RE_MIRROR: Lazy<Regex> = lazy_regex!(r"^(?:MI|SM)(?:A(0|1))?(?:B(0|1))?\*?$");
static RE_AB_VALUES: Lazy<Regex> = lazy_regex!(r"^(?:OF|SF)(?:A([\d.+-]+))?(?:B([\d.+-]+))?\*?$");

fn parse_number<T: FromStr>(text: &str) -> Result<T, ParseErrorKind> {
    text.parse::<T>()
        .map_err(|_| ParseErrorKind::MalformedParameter(format!("invalid number: '{}'", text)))
}

fn capture<'a>(captures: &Captures<'a>, index: usize) -> Option<&'a str> {
    captures
        .get(index)
        .map(|capture| capture.as_str())
}

fn malformed(block: &str) -> ParseErrorKind {
    ParseErrorKind::MalformedParameter(block.trim_end_matches('*').to_string())
}

/// Reads RS-274X source into a [`Gerber`].
///
/// Blocks are applied in order to the current [`LayerParser`], a new layer is started by
/// `LN`, `SR` and by `LP` once the current layer has geometry.
#[derive(Debug, Default)]
pub struct Parser {
    name: Option<String>,
    units: Option<Unit>,
    coordinate_format: Option<CoordinateFormat>,
    zero_omission: Option<ZeroOmission>,
    coordinate_mode: CoordinateMode,
    image_parameters: ImageParameters,
    apertures: ApertureTable,
    macros: MacroTable,
    layers: Vec<LayerParser>,
    new_layer_polarity: Polarity,
    eof: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apertures(&self) -> &ApertureTable {
        &self.apertures
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn layers(&self) -> &[LayerParser] {
        &self.layers
    }

    /// `true` once `M02` has been read.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Parses the whole of `input` and finishes the document.
    #[profiling::function]
    pub fn parse(mut self, input: &str) -> Result<Gerber, ParseError> {
        self.parse_str(input)?;
        self.finish()
    }

    pub fn parse_reader<R: Read>(self, mut reader: R) -> Result<Gerber, ParseError> {
        let mut input = String::new();
        reader
            .read_to_string(&mut input)
            .map_err(|error| ParseError::new(ParseErrorKind::Io(error.to_string())))?;
        self.parse(&input)
    }

    /// Applies every block in `input`, may be called repeatedly with consecutive chunks that
    /// each end on a block boundary.
    pub fn parse_str(&mut self, input: &str) -> Result<(), ParseError> {
        let mut rest = input;

        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }

            if let Some(after) = rest.strip_prefix('%') {
                let Some(end) = after.find('%') else {
                    return Err(ParseError::new(ParseErrorKind::MalformedBlock).in_block(rest.trim_end()));
                };
                let block = &rest[..end + 2];
                let body = &after[..end];
                rest = &after[end + 1..];

                self.check_eof(block)?;
                trace!("extended block: {:?}", block);
                self.parse_extended(body)
                    .map_err(|error| error.in_block(block))?;
            } else {
                let (block, remainder) = match rest.find('*') {
                    Some(end) => rest.split_at(end + 1),
                    None => (rest, ""),
                };
                rest = remainder;

                let block = block.trim();
                if block == "*" {
                    continue;
                }

                self.check_eof(block)?;
                trace!("block: {:?}", block);
                self.parse_function(block)
                    .map_err(|kind| ParseError::from(kind).in_block(block))?;
            }
        }
        Ok(())
    }

    fn check_eof(&self, block: &str) -> Result<(), ParseError> {
        match self.eof {
            true => Err(ParseError::new(ParseErrorKind::UnexpectedDataAfterEof).in_block(block)),
            false => Ok(()),
        }
    }

    /// Drops layers without an aperture selection and resolves the apertures of the others.
    pub fn finish(self) -> Result<Gerber, ParseError> {
        let Parser {
            name,
            units,
            coordinate_format,
            zero_omission,
            image_parameters,
            apertures,
            macros,
            layers,
            ..
        } = self;

        let layers = layers
            .into_iter()
            .filter(|layer| !layer.is_empty())
            .map(|layer| layer.finish(&apertures))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Parsed gerber. name: {:?}, units: {:?}, apertures: {}, macros: {}, layers: {}",
            name,
            units,
            apertures.len(),
            macros.len(),
            layers.len()
        );

        Ok(Gerber {
            name,
            units,
            coordinate_format,
            zero_omission,
            image_parameters,
            apertures,
            macros,
            layers,
        })
    }

    fn current_layer(&mut self) -> &mut LayerParser {
        if self.layers.is_empty() {
            return self.new_layer();
        }
        let index = self.layers.len() - 1;
        &mut self.layers[index]
    }

    fn new_layer(&mut self) -> &mut LayerParser {
        let mut layer = match self.layers.last() {
            Some(previous) => LayerParser::continue_from(previous),
            None => {
                let mut layer = LayerParser::new();
                layer.set_coordinate_mode(self.coordinate_mode);
                layer
            }
        };
        layer.polarity = self.new_layer_polarity;
        if let Some(units) = self.units {
            layer.set_units(units);
        }

        debug!("new layer. index: {}, polarity: {:?}", self.layers.len(), layer.polarity);
        let index = self.layers.len();
        self.layers.push(layer);
        &mut self.layers[index]
    }

    fn set_units(&mut self, units: Unit) {
        self.units = Some(units);
        self.current_layer().set_units(units);
    }

    /// Decodes a coordinate field using the current format and units.
    pub fn parse_coordinate(&self, digits: &str) -> Result<UnitValue, ParseErrorKind> {
        let units = self.units.ok_or(ParseErrorKind::UnitsNotSet)?;
        let (Some(format), Some(zero_omission)) = (self.coordinate_format, self.zero_omission) else {
            return Err(ParseErrorKind::CoordinateFormatNotSet);
        };
        let value = format.decode(digits, zero_omission)?;
        Ok(UnitValue::new(value, units))
    }

    fn parse_coordinate_field(&self, digits: Option<&str>) -> Result<Option<f64>, ParseErrorKind> {
        digits
            .map(|digits| {
                self.parse_coordinate(digits)
                    .map(|value| value.value())
            })
            .transpose()
    }

    /// A decimal value in the current units.
    fn parse_float(&self, text: &str) -> Result<UnitValue, ParseErrorKind> {
        let units = self.units.ok_or(ParseErrorKind::UnitsNotSet)?;
        Ok(UnitValue::new(parse_number(text)?, units))
    }

    fn parse_function(&mut self, block: &str) -> Result<(), ParseErrorKind> {
        if let Some(captures) = RE_DCODE.captures(block) {
            let dcode = parse_number(&captures[1])?;
            return self.current_layer().parse_dcode(dcode);
        }

        if let Some(captures) = RE_MCODE.captures(block) {
            let mcode = parse_number(&captures[1])?;
            if self.current_layer().parse_mcode(mcode)? {
                debug!("end of file");
                self.eof = true;
            }
            return Ok(());
        }

        if RE_COMMENT.is_match(block) {
            trace!("comment: {:?}", block);
            return Ok(());
        }

        if let Some(captures) = RE_G54.captures(block) {
            warn!("Deprecated G-code: G54");
            let dcode = parse_number(&captures[1])?;
            return self
                .current_layer()
                .parse_gcode(Some(54), None, None, None, None, Some(dcode));
        }

        if let Some(captures) = RE_UNITS_GCODE.captures(block) {
            warn!("Deprecated G-code: {}", block.trim_end_matches('*'));
            match &captures[1] {
                "0" => self.set_units(Unit::Inch),
                _ => self.set_units(Unit::Millimeter),
            }
            return Ok(());
        }

        if let Some(captures) = RE_COORDINATES.captures(block) {
            let gcode: Option<u32> = capture(&captures, 1)
                .map(parse_number)
                .transpose()?;
            let x = self.parse_coordinate_field(capture(&captures, 2))?;
            let y = self.parse_coordinate_field(capture(&captures, 3))?;
            let i = self.parse_coordinate_field(capture(&captures, 4))?;
            let j = self.parse_coordinate_field(capture(&captures, 5))?;
            let dcode: Option<u32> = capture(&captures, 6)
                .map(parse_number)
                .transpose()?;

            return self
                .current_layer()
                .parse_gcode(gcode, x, y, i, j, dcode);
        }

        Err(ParseErrorKind::MalformedBlock)
    }

    /// Handles the body of a `%...%` block, which holds one or more parameters.
    fn parse_extended(&mut self, body: &str) -> Result<(), ParseError> {
        let body = body.trim();
        if !RE_PARAMETER.is_match(body) {
            return Err(ParseErrorKind::MalformedBlock.into());
        }

        if body.starts_with("AM") {
            return self.parse_macro(body);
        }

        let body = body.replace(['\r', '\n'], "");
        for parameter in body.split_inclusive('*') {
            let parameter = parameter.trim();
            if parameter.is_empty() || parameter == "*" {
                continue;
            }
            self.parse_parameter(parameter)
                .map_err(|kind| ParseError::from(kind).in_block(parameter))?;
        }
        Ok(())
    }

    fn parse_macro(&mut self, body: &str) -> Result<(), ParseError> {
        let mut lines = body
            .split('*')
            .map(str::trim)
            .filter(|line| !line.is_empty());

        let header = lines.next().unwrap_or_default();
        let name = header
            .strip_prefix("AM")
            .unwrap_or_default()
            .trim();
        if name.is_empty() {
            return Err(ParseError::from(malformed(header)).in_block(header));
        }

        let aperture_macro = self.macros.get_or_insert(name);
        for line in lines {
            if let Some(captures) = RE_MACRO_DEFINITION.captures(line) {
                let variable: u32 = parse_number(&captures[1]).map_err(|kind| ParseError::from(kind).in_block(line))?;
                aperture_macro.push_definition(variable, captures[2].trim());
                continue;
            }

            if let Some(captures) = RE_MACRO_COMMENT.captures(line) {
                if let Some(text) = capture(&captures, 1).filter(|text| !text.is_empty()) {
                    aperture_macro.push_comment(text);
                }
                continue;
            }

            let mut fields = line.split(',').map(str::trim);
            let code: u32 = fields
                .next()
                .map(parse_number)
                .transpose()
                .map_err(|kind| ParseError::from(kind).in_block(line))?
                .ok_or_else(|| ParseError::from(ParseErrorKind::MalformedBlock).in_block(line))?;

            let mut arguments = vec![];
            for field in fields {
                let argument = match RE_MACRO_VARIABLE.captures(field) {
                    Some(captures) => {
                        let slot: usize = parse_number(&captures[1]).map_err(|kind| ParseError::from(kind).in_block(line))?;
                        MacroArgument::Variable(aperture_macro.variable(slot))
                    }
                    None => match field.parse::<f64>() {
                        Ok(value) => MacroArgument::Value(value),
                        Err(_) => MacroArgument::Expression(field.to_string()),
                    },
                };
                arguments.push(argument);
            }

            aperture_macro
                .push_primitive(code, arguments)
                .map_err(|kind| ParseError::from(kind).in_block(line))?;
        }

        debug!("defined macro '{}', primitives: {}", name, aperture_macro.primitives().len());
        Ok(())
    }

    fn parse_parameter(&mut self, block: &str) -> Result<(), ParseErrorKind> {
        let directive = block.get(..2).unwrap_or(block);

        match directive {
            "FS" => self.parse_format_specification(block),
            "MO" => {
                let captures = RE_MODE
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                match &captures[1] {
                    "IN" => self.set_units(Unit::Inch),
                    _ => self.set_units(Unit::Millimeter),
                }
                Ok(())
            }
            "AD" => self.parse_aperture_definition(block),
            "LN" => {
                let captures = RE_LAYER_NAME
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                let name = captures[1].to_string();
                self.new_layer().name = Some(name);
                Ok(())
            }
            "LP" => {
                let captures = RE_LAYER_POLARITY
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                let polarity = match &captures[1] {
                    "C" => Polarity::Clear,
                    _ => Polarity::Dark,
                };
                self.new_layer_polarity = polarity;

                match self
                    .layers
                    .last()
                    .is_some_and(LayerParser::has_geometry)
                {
                    true => {
                        self.new_layer();
                    }
                    false => self.current_layer().polarity = polarity,
                }
                Ok(())
            }
            "SR" => self.parse_step_and_repeat(block),
            "IN" => {
                let captures = RE_IMAGE_NAME
                    .captures(block)
                    .ok_or_else(|| ParseErrorKind::InvalidImageName(block[2..].trim_end_matches('*').to_string()))?;
                self.name = Some(captures[1].to_string());
                Ok(())
            }
            "IP" | "IR" | "AS" | "MI" | "OF" | "SF" | "SM" => {
                warn!("Use of deprecated parameter: {}", block.trim_end_matches('*'));
                self.parse_image_parameter(directive, block)
            }
            "IJ" => {
                warn!("Ignoring deprecated parameter: {}", block.trim_end_matches('*'));
                Ok(())
            }
            "IC" => {
                warn!("Use of deprecated IC parameter: {}", block.trim_end_matches('*'));
                Ok(())
            }
            "KO" => Err(ParseErrorKind::UnsupportedParameter(directive.to_string())),
            _ => Err(ParseErrorKind::UnrecognizedParameter(directive.to_string())),
        }
    }

    fn parse_format_specification(&mut self, block: &str) -> Result<(), ParseErrorKind> {
        let captures = RE_FORMAT_SPECIFICATION
            .captures(block)
            .ok_or_else(|| malformed(block))?;

        let zero_omission = match &captures[1] {
            "L" => ZeroOmission::Leading,
            _ => ZeroOmission::Trailing,
        };
        let coordinate_mode = match &captures[2] {
            "A" => CoordinateMode::Absolute,
            _ => CoordinateMode::Incremental,
        };

        let (x_integer, x_decimal) = (&captures[3], &captures[4]);
        let (y_integer, y_decimal) = (&captures[5], &captures[6]);
        if x_integer != y_integer || x_decimal != y_decimal {
            return Err(ParseErrorKind::FormatMismatch);
        }

        let format = CoordinateFormat::new(parse_number(x_integer)?, parse_number(x_decimal)?);
        debug!(
            "format specification. format: {:?}, zero omission: {:?}, mode: {:?}",
            format, zero_omission, coordinate_mode
        );

        self.coordinate_format = Some(format);
        self.zero_omission = Some(zero_omission);
        self.coordinate_mode = coordinate_mode;
        self.current_layer()
            .set_coordinate_mode(coordinate_mode);
        Ok(())
    }

    fn parse_aperture_definition(&mut self, block: &str) -> Result<(), ParseErrorKind> {
        let captures = RE_APERTURE_DEFINITION
            .captures(block)
            .ok_or_else(|| malformed(block))?;

        let number: usize = parse_number(&captures[1])?;
        if number < ApertureTable::FIRST_USER_NUMBER {
            return Err(ParseErrorKind::ReservedApertureNumber(number as u32));
        }

        let code = &captures[2];
        let modifiers = match capture(&captures, 3).map(str::trim) {
            Some(text) if !text.is_empty() => text
                .split('X')
                .map(|modifier| parse_number::<f64>(modifier.trim()))
                .collect::<Result<Vec<_>, _>>()?,
            _ => vec![],
        };

        let aperture = match code {
            "C" | "R" | "O" | "P" => {
                let units = self.units.ok_or(ParseErrorKind::UnitsNotSet)?;
                Aperture::from_standard(code, &modifiers, units)?
                    .ok_or_else(|| ParseErrorKind::InvalidApertureDefinition(block.to_string()))?
            }
            name => {
                if self.macros.get(name).is_none() {
                    return Err(ParseErrorKind::UndefinedMacro(name.to_string()));
                }
                Aperture::macro_reference(name, modifiers)
            }
        };

        debug!("defined aperture. number: {}, aperture: {:?}", number, aperture);
        self.apertures.insert(number, aperture)
    }

    fn parse_step_and_repeat(&mut self, block: &str) -> Result<(), ParseErrorKind> {
        let captures = RE_STEP_AND_REPEAT
            .captures(block)
            .ok_or_else(|| malformed(block))?;

        let repeat_x: u32 = capture(&captures, 1)
            .map(parse_number)
            .transpose()?
            .unwrap_or(1);
        let repeat_y: u32 = capture(&captures, 2)
            .map(parse_number)
            .transpose()?
            .unwrap_or(1);
        let step_x = capture(&captures, 3)
            .map(|text| self.parse_float(text))
            .transpose()?
            .map_or(0.0, |value| value.value());
        let step_y = capture(&captures, 4)
            .map(|text| self.parse_float(text))
            .transpose()?
            .map_or(0.0, |value| value.value());

        let layer = self.new_layer();
        layer.step = Vector::new(step_x, step_y);
        layer.repeat = (repeat_x, repeat_y);
        Ok(())
    }

    fn parse_image_parameter(&mut self, directive: &str, block: &str) -> Result<(), ParseErrorKind> {
        match directive {
            "IP" => {
                let captures = RE_IMAGE_POLARITY
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                self.image_parameters.polarity = match &captures[1] {
                    "NEG" => ImagePolarity::Negative,
                    _ => ImagePolarity::Positive,
                };
            }
            "IR" => {
                let captures = RE_IMAGE_ROTATION
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                self.image_parameters.rotation = parse_number(&captures[1])?;
            }
            "AS" => {
                let captures = RE_AXIS_SELECT
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                let axis = |index: usize| {
                    capture(&captures, index).map(|axis| match axis {
                        "X" => Axis::X,
                        _ => Axis::Y,
                    })
                };
                let (Some(a), Some(b)) = (axis(1), axis(2)) else {
                    return Err(ParseErrorKind::InvalidAxisSelect("both axes must be specified".to_string()));
                };
                if a == b {
                    return Err(ParseErrorKind::InvalidAxisSelect(
                        "both data axes map to the same output axis".to_string(),
                    ));
                }
                self.image_parameters.axis_select = AxisSelect {
                    a,
                    b,
                };
            }
            "MI" | "SM" => {
                let captures = RE_MIRROR
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                let (a, b) = (capture(&captures, 1), capture(&captures, 2));
                if directive == "MI" && a.is_none() && b.is_none() {
                    return Err(malformed(block));
                }
                let mirroring = Mirroring::from([a == Some("1"), b == Some("1")]);
                match directive {
                    "MI" => self.image_parameters.mirroring = mirroring,
                    _ => self.image_parameters.symbol_mirroring = mirroring,
                }
            }
            "OF" => {
                let captures = RE_AB_VALUES
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                let units = self.units.ok_or(ParseErrorKind::UnitsNotSet)?;
                let value = |index: usize| -> Result<UnitValue, ParseErrorKind> {
                    match capture(&captures, index) {
                        Some(text) => Ok(UnitValue::new(parse_number(text)?, units)),
                        None => Ok(UnitValue::new(0.0, units)),
                    }
                };
                self.image_parameters.offset = Some((value(1)?, value(2)?));
            }
            _ => {
                let captures = RE_AB_VALUES
                    .captures(block)
                    .ok_or_else(|| malformed(block))?;
                let factor = |index: usize| -> Result<f64, ParseErrorKind> {
                    capture(&captures, index)
                        .map(parse_number)
                        .transpose()
                        .map(|factor| factor.unwrap_or(1.0))
                };
                self.image_parameters.scale = (factor(1)?, factor(2)?);
            }
        }
        Ok(())
    }
}
