use std::collections::BTreeMap;

use log::{debug, info, trace, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Layer, Polarity};
use crate::aperture::ApertureTable;
use crate::error::ParseErrorKind;
use crate::geometry::{Arc, Geometry, Line};
use crate::spacial::{Position, Signum, Vector};
use crate::units::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoordinateMode {
    #[default]
    Absolute,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum QuadrantMode {
    #[default]
    Single,
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// D01
    On,
    /// D02
    #[default]
    Off,
    /// D03
    Flash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    #[default]
    Linear,
    Clockwise,
    CounterClockwise,
}

/// Drawing state for one layer while a document is being parsed.
///
/// D-codes and G-codes are applied in order, omitted fields fall back to the modal state.
/// Geometry is keyed by aperture number, the apertures are resolved by [`LayerParser::finish`].
#[derive(Debug, Clone, Default)]
pub struct LayerParser {
    pub name: Option<String>,
    pub polarity: Polarity,
    pub step: Vector,
    pub repeat: (u32, u32),

    coordinate_mode: CoordinateMode,
    quadrant_mode: QuadrantMode,
    draw_mode: DrawMode,
    interpolation_mode: InterpolationMode,
    current_aperture: Option<u32>,
    position: Option<Position>,
    units: Option<Unit>,
    geometry: BTreeMap<u32, Vec<Geometry>>,
}

impl LayerParser {
    pub fn new() -> Self {
        Self {
            repeat: (1, 1),
            ..Self::default()
        }
    }

    /// A new layer which keeps the modal state of `previous` but none of its geometry.
    pub fn continue_from(previous: &LayerParser) -> Self {
        Self {
            coordinate_mode: previous.coordinate_mode,
            quadrant_mode: previous.quadrant_mode,
            draw_mode: previous.draw_mode,
            interpolation_mode: previous.interpolation_mode,
            current_aperture: previous.current_aperture,
            position: previous.position,
            units: previous.units,
            ..Self::new()
        }
    }

    pub fn units(&self) -> Option<Unit> {
        self.units
    }

    /// Sets the units, the first call places the current position at the origin.
    pub fn set_units(&mut self, unit: Unit) {
        if self.units.is_some_and(|units| units != unit) {
            warn!("Units changed after being set, from: {:?}, to: {:?}", self.units, unit);
        }
        self.units = Some(unit);
        self.position
            .get_or_insert(Position::origin());
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn coordinate_mode(&self) -> CoordinateMode {
        self.coordinate_mode
    }

    pub fn set_coordinate_mode(&mut self, mode: CoordinateMode) {
        self.coordinate_mode = mode;
    }

    pub fn quadrant_mode(&self) -> QuadrantMode {
        self.quadrant_mode
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    pub fn interpolation_mode(&self) -> InterpolationMode {
        self.interpolation_mode
    }

    pub fn current_aperture(&self) -> Option<u32> {
        self.current_aperture
    }

    /// Makes `number` the current aperture and allocates its geometry list.
    pub fn select_aperture(&mut self, number: u32) {
        trace!("select aperture: {}", number);
        self.current_aperture = Some(number);
        self.geometry
            .entry(number)
            .or_default();
    }

    pub fn geometry(&self) -> &BTreeMap<u32, Vec<Geometry>> {
        &self.geometry
    }

    /// A layer is empty until an aperture has been selected.
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry
            .values()
            .any(|elements| !elements.is_empty())
    }

    pub fn parse_dcode(&mut self, dcode: u32) -> Result<(), ParseErrorKind> {
        match dcode {
            1 => self.draw_mode = DrawMode::On,
            2 => self.draw_mode = DrawMode::Off,
            3 => self.draw_mode = DrawMode::Flash,
            0 | 4..=9 => return Err(ParseErrorKind::InvalidDCode(dcode)),
            number => self.select_aperture(number),
        }
        Ok(())
    }

    /// Applies a function code block, `gcode` falls back to the modal interpolation mode.
    pub fn parse_gcode(
        &mut self,
        gcode: Option<u32>,
        x: Option<f64>,
        y: Option<f64>,
        i: Option<f64>,
        j: Option<f64>,
        dcode: Option<u32>,
    ) -> Result<(), ParseErrorKind> {
        // a bare G01/G02/G03 only changes the modal interpolation mode
        let mode_only = gcode.is_some() && [x, y, i, j].iter().all(Option::is_none) && dcode.is_none();

        let code = gcode.unwrap_or(match self.interpolation_mode {
            InterpolationMode::Linear => 1,
            InterpolationMode::Clockwise => 2,
            InterpolationMode::CounterClockwise => 3,
        });

        match code {
            1 | 55 => {
                if code == 55 {
                    warn!("Deprecated G-code: G55");
                }
                self.interpolation_mode = InterpolationMode::Linear;
                if !mode_only {
                    self.linear(x, y, dcode)?;
                }
            }
            2 | 3 => {
                self.interpolation_mode = match code {
                    2 => InterpolationMode::Clockwise,
                    _ => InterpolationMode::CounterClockwise,
                };
                if !mode_only {
                    self.circular(x, y, i, j, dcode)?;
                }
            }
            4 => {}
            36 | 37 => info!("Region mode not supported, G{}", code),
            54 => match dcode {
                Some(dcode) => self.parse_dcode(dcode)?,
                None => return Err(ParseErrorKind::MalformedBlock),
            },
            70 => self.set_units(Unit::Inch),
            71 => self.set_units(Unit::Millimeter),
            74 => self.quadrant_mode = QuadrantMode::Single,
            75 => self.quadrant_mode = QuadrantMode::Multi,
            90 => self.coordinate_mode = CoordinateMode::Absolute,
            91 => self.coordinate_mode = CoordinateMode::Incremental,
            _ => return Err(ParseErrorKind::UnrecognizedGCode(code)),
        }
        Ok(())
    }

    /// Returns `true` when the code ends the file.
    pub fn parse_mcode(&mut self, mcode: u32) -> Result<bool, ParseErrorKind> {
        match mcode {
            0 | 1 => Ok(false),
            2 => Ok(true),
            _ => Err(ParseErrorKind::InvalidMCode(mcode)),
        }
    }

    fn resolve_draw_mode(&self, dcode: Option<u32>) -> Result<DrawMode, ParseErrorKind> {
        match dcode {
            None => Ok(self.draw_mode),
            Some(1) => Ok(DrawMode::On),
            Some(2) => Ok(DrawMode::Off),
            Some(3) => Ok(DrawMode::Flash),
            Some(other) => Err(ParseErrorKind::InvalidDCode(other)),
        }
    }

    fn current_position(&self) -> Result<Position, ParseErrorKind> {
        match (self.units, self.position) {
            (Some(_), Some(position)) => Ok(position),
            _ => Err(ParseErrorKind::UnitsNotSet),
        }
    }

    fn target(&self, position: Position, x: Option<f64>, y: Option<f64>) -> Position {
        match self.coordinate_mode {
            CoordinateMode::Absolute => Position::new(x.unwrap_or(position.x), y.unwrap_or(position.y)),
            CoordinateMode::Incremental => position + Vector::new(x.unwrap_or(0.0), y.unwrap_or(0.0)),
        }
    }

    fn push(&mut self, element: Geometry) -> Result<(), ParseErrorKind> {
        let number = self
            .current_aperture
            .ok_or(ParseErrorKind::NoApertureSelected)?;
        trace!("aperture: {}, element: {:?}", number, element);
        self.geometry
            .entry(number)
            .or_default()
            .push(element);
        Ok(())
    }

    fn linear(&mut self, x: Option<f64>, y: Option<f64>, dcode: Option<u32>) -> Result<(), ParseErrorKind> {
        let draw_mode = self.resolve_draw_mode(dcode)?;
        let position = self.current_position()?;
        let target = self.target(position, x, y);

        match draw_mode {
            DrawMode::On => self.push(Geometry::Line(Line::new(position, target)))?,
            DrawMode::Off => {}
            DrawMode::Flash => self.push(Geometry::Point(target))?,
        }

        self.position = Some(target);
        self.draw_mode = draw_mode;
        Ok(())
    }

    fn circular(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        i: Option<f64>,
        j: Option<f64>,
        dcode: Option<u32>,
    ) -> Result<(), ParseErrorKind> {
        let draw_mode = self.resolve_draw_mode(dcode)?;
        if draw_mode == DrawMode::Flash {
            return Err(ParseErrorKind::InvalidDCode(3));
        }

        let position = self.current_position()?;
        let target = self.target(position, x, y);

        if draw_mode == DrawMode::On {
            let mut offset = Vector::new(i.unwrap_or(0.0), j.unwrap_or(0.0));
            if self.quadrant_mode == QuadrantMode::Single {
                // the offsets are unsigned, they take the direction of travel
                let direction = (target - position).signum_or_zero();
                offset = Vector::new(offset.x.abs() * direction.x, offset.y.abs() * direction.y);
            }
            let center = position + offset;

            let arc = match self.interpolation_mode {
                InterpolationMode::Clockwise => Arc::new(center, target, position),
                _ => Arc::new(center, position, target),
            };
            self.push(Geometry::Arc(arc))?;
        }

        self.position = Some(target);
        self.draw_mode = draw_mode;
        Ok(())
    }

    /// Resolves each aperture number against `apertures`.
    pub fn finish(self, apertures: &ApertureTable) -> Result<Layer, ParseErrorKind> {
        let mut layer = Layer {
            name: self.name,
            polarity: self.polarity,
            step: self.step,
            repeat: self.repeat,
            ..Layer::default()
        };

        for (number, elements) in self.geometry {
            let aperture = apertures
                .get(number as usize)
                .ok_or(ParseErrorKind::UndefinedAperture(number))?;
            layer
                .elements_mut(aperture)
                .extend(elements);
        }

        debug!("finished layer. name: {:?}, apertures: {}", layer.name, layer.geometry().len());
        Ok(layer)
    }
}
