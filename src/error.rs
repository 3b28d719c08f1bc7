use thiserror::Error;

/// A parse failure, with the block that caused it when one is known.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}{}", .block.as_ref().map(|block| format!(", block: '{}'", block)).unwrap_or_default())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub block: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            block: None,
        }
    }

    /// Attaches the offending block, keeping the innermost one if already present.
    pub fn in_block(mut self, block: &str) -> Self {
        if self.block.is_none() {
            self.block = Some(block.to_string());
        }
        self
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(kind: ParseErrorKind) -> Self {
        ParseError::new(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("Malformed block")]
    MalformedBlock,
    #[error("Malformed parameter, {0}")]
    MalformedParameter(String),
    #[error("Unrecognized parameter type: {0}")]
    UnrecognizedParameter(String),
    #[error("Parameter not supported: {0}")]
    UnsupportedParameter(String),
    #[error("Unrecognized G-code: {0}")]
    UnrecognizedGCode(u32),
    #[error("Invalid D-code: {0}")]
    InvalidDCode(u32),
    #[error("Invalid M-code: {0}")]
    InvalidMCode(u32),
    #[error("Outline vertex count mismatch, declared: {declared}, coordinates: {coordinates}")]
    VertexCountMismatch { declared: usize, coordinates: usize },
    #[error("Invalid image name: '{0}'")]
    InvalidImageName(String),
    #[error("Unexpected data after end of file")]
    UnexpectedDataAfterEof,
    #[error("Units not set")]
    UnitsNotSet,
    #[error("Coordinate format not set")]
    CoordinateFormatNotSet,
    #[error("Invalid coordinate: '{0}'")]
    InvalidCoordinate(String),
    #[error("No aperture selected")]
    NoApertureSelected,
    #[error("X and Y coordinate formats must match")]
    FormatMismatch,
    #[error("Aperture macro not defined: {0}")]
    UndefinedMacro(String),
    #[error("Undefined aperture number: {0}")]
    UndefinedAperture(u32),
    #[error("Aperture numbers below 10 are reserved, number: {0}")]
    ReservedApertureNumber(u32),
    #[error("Invalid aperture definition, {0}")]
    InvalidApertureDefinition(String),
    #[error("Rotation must be zero for a primitive centered on the origin, primitive code: {0}")]
    InvalidMacroRotation(u32),
    #[error("Thermal gap must be less than the outer diameter")]
    InvalidThermalGap,
    #[error("Unrecognized macro primitive code: {0}")]
    UnrecognizedPrimitive(u32),
    #[error("Invalid macro argument, {0}")]
    InvalidMacroArgument(String),
    #[error("Invalid axis select, {0}")]
    InvalidAxisSelect(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// A document which cannot be serialized.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnparseError {
    #[error("Units not set")]
    UnitsNotSet,
    #[error("Zero omission not set")]
    ZeroOmissionNotSet,
    #[error("Coordinate format not set")]
    CoordinateFormatNotSet,
    #[error("Coordinate out of range, value: {value}, integer places: {integer_places}")]
    CoordinateOutOfRange { value: f64, integer_places: u8 },
    #[error("Macro variable not in modifier slots, macro: '{0}'")]
    UnboundMacroVariable(String),
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}
