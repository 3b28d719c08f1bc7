use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::aperture_macro::{ApertureMacro, MacroTable};
use crate::error::ParseErrorKind;
use crate::geometry::BoundingBox;
use crate::spacial::Size;
use crate::units::{Unit, UnitValue};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Hole {
    Round(UnitValue),
    Rectangular { x: UnitValue, y: UnitValue },
}

impl Display for Hole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Hole::Round(diameter) => write!(f, "X{}", diameter),
            Hole::Rectangular {
                x,
                y,
            } => write!(f, "X{}X{}", x, y),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ApertureShape {
    Circle { diameter: UnitValue },
    Rectangle { x: UnitValue, y: UnitValue },
    Obround { x: UnitValue, y: UnitValue },
    Polygon { diameter: UnitValue, sides: u32 },
    /// References an aperture macro by name, resolved through the document's [`MacroTable`].
    Macro { name: String },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aperture {
    pub shape: ApertureShape,
    pub hole: Option<Hole>,
    /// Degrees, only used by polygon apertures.
    pub rotation: f64,
    /// Values bound to `$1..$n` of a macro aperture.
    pub parameters: Vec<f64>,
}

impl Aperture {
    fn new(shape: ApertureShape) -> Self {
        Self {
            shape,
            hole: None,
            rotation: 0.0,
            parameters: vec![],
        }
    }

    pub fn circle(diameter: UnitValue) -> Self {
        Self::new(ApertureShape::Circle {
            diameter,
        })
    }

    pub fn rectangle(x: UnitValue, y: UnitValue) -> Self {
        Self::new(ApertureShape::Rectangle {
            x,
            y,
        })
    }

    pub fn obround(x: UnitValue, y: UnitValue) -> Self {
        Self::new(ApertureShape::Obround {
            x,
            y,
        })
    }

    pub fn polygon(diameter: UnitValue, sides: u32) -> Self {
        Self::new(ApertureShape::Polygon {
            diameter,
            sides,
        })
    }

    pub fn macro_reference(name: impl Into<String>, parameters: Vec<f64>) -> Self {
        Self {
            parameters,
            ..Self::new(ApertureShape::Macro {
                name: name.into(),
            })
        }
    }

    pub fn with_hole(mut self, hole: Hole) -> Self {
        self.hole = Some(hole);
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    /// Builds a standard aperture from an `AD` shape code (`C`, `R`, `O` or `P`) and its modifiers.
    ///
    /// Returns `Ok(None)` for any other code, which names a macro.
    pub fn from_standard(code: &str, modifiers: &[f64], unit: Unit) -> Result<Option<Self>, ParseErrorKind> {
        let length = |value: f64| UnitValue::new(value, unit);
        let invalid = |reason: &str| {
            ParseErrorKind::InvalidApertureDefinition(format!("{}, shape: {}, modifiers: {:?}", reason, code, modifiers))
        };
        let hole = |modifiers: &[f64]| match modifiers {
            [] => Ok(None),
            [diameter] => Ok(Some(Hole::Round(length(*diameter)))),
            [x, y] => Ok(Some(Hole::Rectangular {
                x: length(*x),
                y: length(*y),
            })),
            _ => Err(invalid("too many modifiers")),
        };

        let aperture = match code {
            "C" => match modifiers {
                [diameter, rest @ ..] => Aperture {
                    hole: hole(rest)?,
                    ..Aperture::circle(length(*diameter))
                },
                _ => return Err(invalid("missing diameter")),
            },
            "R" | "O" => match modifiers {
                [x, y, rest @ ..] => {
                    let aperture = match code {
                        "R" => Aperture::rectangle(length(*x), length(*y)),
                        _ => Aperture::obround(length(*x), length(*y)),
                    };
                    Aperture {
                        hole: hole(rest)?,
                        ..aperture
                    }
                }
                _ => return Err(invalid("missing size")),
            },
            "P" => match modifiers {
                [diameter, sides, rest @ ..] => {
                    if sides.fract() != 0.0 || !(3.0..=12.0).contains(sides) {
                        return Err(invalid("polygon sides must be a whole number from 3 to 12"));
                    }
                    let (rotation, rest) = match rest {
                        [rotation, rest @ ..] => (*rotation, rest),
                        [] => (0.0, rest),
                    };
                    Aperture {
                        hole: hole(rest)?,
                        rotation,
                        ..Aperture::polygon(length(*diameter), *sides as u32)
                    }
                }
                _ => return Err(invalid("missing diameter or sides")),
            },
            _ => return Ok(None),
        };

        Ok(Some(aperture))
    }

    pub fn macro_name(&self) -> Option<&str> {
        match &self.shape {
            ApertureShape::Macro {
                name,
            } => Some(name),
            _ => None,
        }
    }

    /// Resolves the macro backing this aperture, `None` for standard apertures or unknown macros.
    pub fn resolve_macro<'a>(&self, macros: &'a MacroTable) -> Option<&'a ApertureMacro> {
        self.macro_name()
            .and_then(|name| macros.get(name))
    }

    /// Bounding width and height in `unit`, macro apertures have no intrinsic size.
    pub fn size(&self, unit: Unit) -> Option<Size> {
        let value = |length: &UnitValue| length.to(unit).value();
        match &self.shape {
            ApertureShape::Circle {
                diameter,
            }
            | ApertureShape::Polygon {
                diameter,
                ..
            } => Some(Size::new(value(diameter), value(diameter))),
            ApertureShape::Rectangle {
                x,
                y,
            }
            | ApertureShape::Obround {
                x,
                y,
            } => Some(Size::new(value(x), value(y))),
            ApertureShape::Macro {
                ..
            } => None,
        }
    }

    /// The same aperture with every length expressed in `unit`.
    ///
    /// Macro parameters are unitless and kept as they are.
    pub fn to_unit(&self, unit: Unit) -> Aperture {
        let shape = match &self.shape {
            ApertureShape::Circle {
                diameter,
            } => ApertureShape::Circle {
                diameter: diameter.to(unit),
            },
            ApertureShape::Rectangle {
                x,
                y,
            } => ApertureShape::Rectangle {
                x: x.to(unit),
                y: y.to(unit),
            },
            ApertureShape::Obround {
                x,
                y,
            } => ApertureShape::Obround {
                x: x.to(unit),
                y: y.to(unit),
            },
            ApertureShape::Polygon {
                diameter,
                sides,
            } => ApertureShape::Polygon {
                diameter: diameter.to(unit),
                sides: *sides,
            },
            ApertureShape::Macro {
                name,
            } => ApertureShape::Macro {
                name: name.clone(),
            },
        };
        let hole = self
            .hole
            .as_ref()
            .map(|hole| match hole {
                Hole::Round(diameter) => Hole::Round(diameter.to(unit)),
                Hole::Rectangular {
                    x,
                    y,
                } => Hole::Rectangular {
                    x: x.to(unit),
                    y: y.to(unit),
                },
            });

        Aperture {
            shape,
            hole,
            rotation: self.rotation,
            parameters: self.parameters.clone(),
        }
    }

    /// A box of [`Aperture::size`], centered on the flash position.
    pub fn bounds(&self, unit: Unit) -> Option<BoundingBox> {
        self.size(unit)
            .map(BoundingBox::from_size)
    }
}

/// Formats the body of an `AD` directive, following the aperture number.
impl Display for Aperture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.shape {
            ApertureShape::Circle {
                diameter,
            } => write!(f, "C,{}", diameter)?,
            ApertureShape::Rectangle {
                x,
                y,
            } => write!(f, "R,{}X{}", x, y)?,
            ApertureShape::Obround {
                x,
                y,
            } => write!(f, "O,{}X{}", x, y)?,
            ApertureShape::Polygon {
                diameter,
                sides,
            } => {
                write!(f, "P,{}X{}", diameter, sides)?;
                if self.rotation != 0.0 || self.hole.is_some() {
                    write!(f, "X{}", self.rotation)?;
                }
            }
            ApertureShape::Macro {
                name,
            } => {
                write!(f, "{}", name)?;
                if !self.parameters.is_empty() {
                    let parameters = self
                        .parameters
                        .iter()
                        .map(|parameter| parameter.to_string())
                        .collect::<Vec<_>>();
                    write!(f, ",{}", parameters.join("X"))?;
                }
                return Ok(());
            }
        }

        match &self.hole {
            Some(hole) => write!(f, "{}", hole),
            None => Ok(()),
        }
    }
}

/// Apertures indexed by D-code number, numbers 0-9 are reserved.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ApertureTable {
    apertures: Vec<Option<Aperture>>,
}

impl ApertureTable {
    pub const FIRST_USER_NUMBER: usize = 10;

    pub fn get(&self, number: usize) -> Option<&Aperture> {
        self.apertures
            .get(number)
            .and_then(Option::as_ref)
    }

    /// Stores `aperture` under `number`, replacing any previous definition.
    pub fn insert(&mut self, number: usize, aperture: Aperture) -> Result<(), ParseErrorKind> {
        if number < Self::FIRST_USER_NUMBER {
            return Err(ParseErrorKind::ReservedApertureNumber(number as u32));
        }
        if self.apertures.len() <= number {
            self.apertures.resize(number + 1, None);
        }
        self.apertures[number] = Some(aperture);
        Ok(())
    }

    /// Appends `aperture` after the highest number in use, returning its number.
    pub fn push(&mut self, aperture: Aperture) -> usize {
        if self.apertures.len() < Self::FIRST_USER_NUMBER {
            self.apertures
                .resize(Self::FIRST_USER_NUMBER, None);
        }
        self.apertures.push(Some(aperture));
        self.apertures.len() - 1
    }

    pub fn number_of(&self, aperture: &Aperture) -> Option<usize> {
        self.apertures
            .iter()
            .position(|candidate| candidate.as_ref() == Some(aperture))
    }

    /// Defined apertures in number order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Aperture)> {
        self.apertures
            .iter()
            .enumerate()
            .filter_map(|(number, aperture)| aperture.as_ref().map(|aperture| (number, aperture)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
