use std::fmt::{Display, Formatter};

use log::{trace, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseErrorKind, UnparseError};
use crate::expressions::{evaluate_expression, ExpressionEvaluationError, MacroContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    CutOut,
    Add,
}

impl From<bool> for Exposure {
    fn from(value: bool) -> Self {
        match value {
            true => Exposure::Add,
            false => Exposure::CutOut,
        }
    }
}

/// Handle to a variable belonging to one [`ApertureMacro`].
///
/// The `$n` index of a variable is its position in the macro's modifier slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariableId(usize);

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MacroArgument {
    Value(f64),
    Variable(VariableId),
    /// An arithmetic expression, kept as written, e.g. `$1x2`.
    Expression(String),
}

impl MacroArgument {
    pub fn value(&self) -> Option<f64> {
        match self {
            MacroArgument::Value(value) => Some(*value),
            _ => None,
        }
    }

    fn is_known_zero(&self) -> bool {
        self.value() == Some(0.0)
    }

    fn is_known_non_zero(&self) -> bool {
        matches!(self.value(), Some(value) if value != 0.0)
    }
}

impl From<f64> for MacroArgument {
    fn from(value: f64) -> Self {
        MacroArgument::Value(value)
    }
}

impl From<VariableId> for MacroArgument {
    fn from(value: VariableId) -> Self {
        MacroArgument::Variable(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CirclePrimitive {
    pub exposure: MacroArgument,
    pub diameter: MacroArgument,
    pub center_x: MacroArgument,
    pub center_y: MacroArgument,
    pub rotation: Option<MacroArgument>,
}

/// Code 2 or 20.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinePrimitive {
    pub exposure: MacroArgument,
    pub width: MacroArgument,
    pub start_x: MacroArgument,
    pub start_y: MacroArgument,
    pub end_x: MacroArgument,
    pub end_y: MacroArgument,
    pub rotation: MacroArgument,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CenteredLinePrimitive {
    pub exposure: MacroArgument,
    pub width: MacroArgument,
    pub height: MacroArgument,
    pub center_x: MacroArgument,
    pub center_y: MacroArgument,
    pub rotation: MacroArgument,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OriginLinePrimitive {
    pub exposure: MacroArgument,
    pub width: MacroArgument,
    pub height: MacroArgument,
    pub left: MacroArgument,
    pub bottom: MacroArgument,
    pub rotation: MacroArgument,
}

/// `points` holds the start point followed by `vertex_count` further points.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutlinePrimitive {
    pub exposure: MacroArgument,
    pub vertex_count: usize,
    pub points: Vec<(MacroArgument, MacroArgument)>,
    pub rotation: MacroArgument,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonPrimitive {
    pub exposure: MacroArgument,
    pub vertex_count: MacroArgument,
    pub center_x: MacroArgument,
    pub center_y: MacroArgument,
    pub diameter: MacroArgument,
    pub rotation: MacroArgument,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MoirePrimitive {
    pub center_x: MacroArgument,
    pub center_y: MacroArgument,
    pub outer_diameter: MacroArgument,
    pub ring_thickness: MacroArgument,
    pub gap: MacroArgument,
    pub ring_count: MacroArgument,
    pub crosshair_thickness: MacroArgument,
    pub crosshair_length: MacroArgument,
    pub rotation: MacroArgument,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThermalPrimitive {
    pub center_x: MacroArgument,
    pub center_y: MacroArgument,
    pub outer_diameter: MacroArgument,
    pub inner_diameter: MacroArgument,
    pub gap: MacroArgument,
    pub rotation: MacroArgument,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MacroPrimitive {
    Comment(String),
    /// `$<variable>=<expression>`
    Definition {
        variable: u32,
        expression: String,
    },
    Circle(CirclePrimitive),
    Line(LinePrimitive),
    CenteredLine(CenteredLinePrimitive),
    OriginLine(OriginLinePrimitive),
    Outline(OutlinePrimitive),
    Polygon(PolygonPrimitive),
    Moire(MoirePrimitive),
    Thermal(ThermalPrimitive),
}

impl MacroPrimitive {
    /// Builds a primitive from its code and the positional arguments of its AM line.
    pub fn from_arguments(code: u32, arguments: Vec<MacroArgument>) -> Result<Self, ParseErrorKind> {
        let primitive = match code {
            1 => {
                let rotation = match arguments.len() {
                    5 => arguments.get(4).cloned(),
                    _ => None,
                };
                let [exposure, diameter, center_x, center_y] = take_arguments(code, &arguments, 4, 5)?;
                MacroPrimitive::Circle(CirclePrimitive {
                    exposure,
                    diameter,
                    center_x,
                    center_y,
                    rotation,
                })
            }
            2 | 20 => {
                let [exposure, width, start_x, start_y, end_x, end_y, rotation] =
                    take_arguments(code, &arguments, 7, 7)?;
                MacroPrimitive::Line(LinePrimitive {
                    exposure,
                    width,
                    start_x,
                    start_y,
                    end_x,
                    end_y,
                    rotation,
                })
            }
            21 => {
                let [exposure, width, height, center_x, center_y, rotation] = take_arguments(code, &arguments, 6, 6)?;
                MacroPrimitive::CenteredLine(CenteredLinePrimitive {
                    exposure,
                    width,
                    height,
                    center_x,
                    center_y,
                    rotation,
                })
            }
            22 => {
                let [exposure, width, height, left, bottom, rotation] = take_arguments(code, &arguments, 6, 6)?;
                MacroPrimitive::OriginLine(OriginLinePrimitive {
                    exposure,
                    width,
                    height,
                    left,
                    bottom,
                    rotation,
                })
            }
            4 => MacroPrimitive::Outline(build_outline(arguments)?),
            5 => {
                let [exposure, vertex_count, center_x, center_y, diameter, rotation] =
                    take_arguments(code, &arguments, 6, 6)?;
                check_rotation(code, &center_x, &center_y, &rotation)?;
                MacroPrimitive::Polygon(PolygonPrimitive {
                    exposure,
                    vertex_count,
                    center_x,
                    center_y,
                    diameter,
                    rotation,
                })
            }
            6 => {
                let [center_x, center_y, outer_diameter, ring_thickness, gap, ring_count, crosshair_thickness, crosshair_length, rotation] =
                    take_arguments(code, &arguments, 9, 9)?;
                check_rotation(code, &center_x, &center_y, &rotation)?;
                MacroPrimitive::Moire(MoirePrimitive {
                    center_x,
                    center_y,
                    outer_diameter,
                    ring_thickness,
                    gap,
                    ring_count,
                    crosshair_thickness,
                    crosshair_length,
                    rotation,
                })
            }
            7 => {
                let [center_x, center_y, outer_diameter, inner_diameter, gap, rotation] =
                    take_arguments(code, &arguments, 6, 6)?;
                if let (Some(gap), Some(outer_diameter)) = (gap.value(), outer_diameter.value()) {
                    if gap >= outer_diameter {
                        return Err(ParseErrorKind::InvalidThermalGap);
                    }
                }
                check_rotation(code, &center_x, &center_y, &rotation)?;
                MacroPrimitive::Thermal(ThermalPrimitive {
                    center_x,
                    center_y,
                    outer_diameter,
                    inner_diameter,
                    gap,
                    rotation,
                })
            }
            _ => return Err(ParseErrorKind::UnrecognizedPrimitive(code)),
        };

        Ok(primitive)
    }

    /// The code written at the start of the primitive's line, `None` for definitions.
    pub fn code(&self) -> Option<u32> {
        match self {
            MacroPrimitive::Comment(_) => Some(0),
            MacroPrimitive::Definition {
                ..
            } => None,
            MacroPrimitive::Circle(_) => Some(1),
            MacroPrimitive::Line(_) => Some(2),
            MacroPrimitive::CenteredLine(_) => Some(21),
            MacroPrimitive::OriginLine(_) => Some(22),
            MacroPrimitive::Outline(_) => Some(4),
            MacroPrimitive::Polygon(_) => Some(5),
            MacroPrimitive::Moire(_) => Some(6),
            MacroPrimitive::Thermal(_) => Some(7),
        }
    }

    /// Arguments in the order they are written, an outline's vertex count is not included.
    pub fn arguments(&self) -> Vec<&MacroArgument> {
        match self {
            MacroPrimitive::Comment(_)
            | MacroPrimitive::Definition {
                ..
            } => vec![],
            MacroPrimitive::Circle(circle) => {
                let mut arguments = vec![&circle.exposure, &circle.diameter, &circle.center_x, &circle.center_y];
                arguments.extend(circle.rotation.as_ref());
                arguments
            }
            MacroPrimitive::Line(line) => vec![
                &line.exposure,
                &line.width,
                &line.start_x,
                &line.start_y,
                &line.end_x,
                &line.end_y,
                &line.rotation,
            ],
            MacroPrimitive::CenteredLine(line) => vec![
                &line.exposure,
                &line.width,
                &line.height,
                &line.center_x,
                &line.center_y,
                &line.rotation,
            ],
            MacroPrimitive::OriginLine(line) => vec![
                &line.exposure,
                &line.width,
                &line.height,
                &line.left,
                &line.bottom,
                &line.rotation,
            ],
            MacroPrimitive::Outline(outline) => {
                let mut arguments = vec![&outline.exposure];
                for (x, y) in &outline.points {
                    arguments.push(x);
                    arguments.push(y);
                }
                arguments.push(&outline.rotation);
                arguments
            }
            MacroPrimitive::Polygon(polygon) => vec![
                &polygon.exposure,
                &polygon.vertex_count,
                &polygon.center_x,
                &polygon.center_y,
                &polygon.diameter,
                &polygon.rotation,
            ],
            MacroPrimitive::Moire(moire) => vec![
                &moire.center_x,
                &moire.center_y,
                &moire.outer_diameter,
                &moire.ring_thickness,
                &moire.gap,
                &moire.ring_count,
                &moire.crosshair_thickness,
                &moire.crosshair_length,
                &moire.rotation,
            ],
            MacroPrimitive::Thermal(thermal) => vec![
                &thermal.center_x,
                &thermal.center_y,
                &thermal.outer_diameter,
                &thermal.inner_diameter,
                &thermal.gap,
                &thermal.rotation,
            ],
        }
    }

    pub fn exposure(&self) -> Option<Exposure> {
        let exposure = match self {
            MacroPrimitive::Circle(circle) => &circle.exposure,
            MacroPrimitive::Line(line) => &line.exposure,
            MacroPrimitive::CenteredLine(line) => &line.exposure,
            MacroPrimitive::OriginLine(line) => &line.exposure,
            MacroPrimitive::Outline(outline) => &outline.exposure,
            MacroPrimitive::Polygon(polygon) => &polygon.exposure,
            _ => return None,
        };
        exposure
            .value()
            .map(|value| Exposure::from(value != 0.0))
    }

    /// Rebuilds the primitive with each argument replaced by the result of `f`.
    fn try_map_arguments<E>(
        &self,
        mut f: impl FnMut(&MacroArgument) -> Result<MacroArgument, E>,
    ) -> Result<MacroPrimitive, E> {
        let primitive = match self {
            MacroPrimitive::Comment(_)
            | MacroPrimitive::Definition {
                ..
            } => self.clone(),
            MacroPrimitive::Circle(circle) => MacroPrimitive::Circle(CirclePrimitive {
                exposure: f(&circle.exposure)?,
                diameter: f(&circle.diameter)?,
                center_x: f(&circle.center_x)?,
                center_y: f(&circle.center_y)?,
                rotation: circle.rotation.as_ref().map(&mut f).transpose()?,
            }),
            MacroPrimitive::Line(line) => MacroPrimitive::Line(LinePrimitive {
                exposure: f(&line.exposure)?,
                width: f(&line.width)?,
                start_x: f(&line.start_x)?,
                start_y: f(&line.start_y)?,
                end_x: f(&line.end_x)?,
                end_y: f(&line.end_y)?,
                rotation: f(&line.rotation)?,
            }),
            MacroPrimitive::CenteredLine(line) => MacroPrimitive::CenteredLine(CenteredLinePrimitive {
                exposure: f(&line.exposure)?,
                width: f(&line.width)?,
                height: f(&line.height)?,
                center_x: f(&line.center_x)?,
                center_y: f(&line.center_y)?,
                rotation: f(&line.rotation)?,
            }),
            MacroPrimitive::OriginLine(line) => MacroPrimitive::OriginLine(OriginLinePrimitive {
                exposure: f(&line.exposure)?,
                width: f(&line.width)?,
                height: f(&line.height)?,
                left: f(&line.left)?,
                bottom: f(&line.bottom)?,
                rotation: f(&line.rotation)?,
            }),
            MacroPrimitive::Outline(outline) => {
                let mut points = Vec::with_capacity(outline.points.len());
                for (x, y) in &outline.points {
                    points.push((f(x)?, f(y)?));
                }
                MacroPrimitive::Outline(OutlinePrimitive {
                    exposure: f(&outline.exposure)?,
                    vertex_count: outline.vertex_count,
                    points,
                    rotation: f(&outline.rotation)?,
                })
            }
            MacroPrimitive::Polygon(polygon) => MacroPrimitive::Polygon(PolygonPrimitive {
                exposure: f(&polygon.exposure)?,
                vertex_count: f(&polygon.vertex_count)?,
                center_x: f(&polygon.center_x)?,
                center_y: f(&polygon.center_y)?,
                diameter: f(&polygon.diameter)?,
                rotation: f(&polygon.rotation)?,
            }),
            MacroPrimitive::Moire(moire) => MacroPrimitive::Moire(MoirePrimitive {
                center_x: f(&moire.center_x)?,
                center_y: f(&moire.center_y)?,
                outer_diameter: f(&moire.outer_diameter)?,
                ring_thickness: f(&moire.ring_thickness)?,
                gap: f(&moire.gap)?,
                ring_count: f(&moire.ring_count)?,
                crosshair_thickness: f(&moire.crosshair_thickness)?,
                crosshair_length: f(&moire.crosshair_length)?,
                rotation: f(&moire.rotation)?,
            }),
            MacroPrimitive::Thermal(thermal) => MacroPrimitive::Thermal(ThermalPrimitive {
                center_x: f(&thermal.center_x)?,
                center_y: f(&thermal.center_y)?,
                outer_diameter: f(&thermal.outer_diameter)?,
                inner_diameter: f(&thermal.inner_diameter)?,
                gap: f(&thermal.gap)?,
                rotation: f(&thermal.rotation)?,
            }),
        };
        Ok(primitive)
    }
}

fn take_arguments<const N: usize>(
    code: u32,
    arguments: &[MacroArgument],
    minimum: usize,
    maximum: usize,
) -> Result<[MacroArgument; N], ParseErrorKind> {
    if arguments.len() < minimum || arguments.len() > maximum {
        return Err(ParseErrorKind::InvalidMacroArgument(format!(
            "primitive {} expects {} arguments, found {}",
            code,
            minimum,
            arguments.len()
        )));
    }

    Ok(std::array::from_fn(|index| arguments[index].clone()))
}

/// A primitive centered on the origin cannot be rotated.
fn check_rotation(
    code: u32,
    center_x: &MacroArgument,
    center_y: &MacroArgument,
    rotation: &MacroArgument,
) -> Result<(), ParseErrorKind> {
    if rotation.is_known_non_zero() && center_x.is_known_zero() && center_y.is_known_zero() {
        return Err(ParseErrorKind::InvalidMacroRotation(code));
    }
    Ok(())
}

fn build_outline(mut arguments: Vec<MacroArgument>) -> Result<OutlinePrimitive, ParseErrorKind> {
    // exposure, vertex count, start point, rotation
    if arguments.len() < 5 {
        return Err(ParseErrorKind::InvalidMacroArgument(format!(
            "outline expects at least 5 arguments, found {}",
            arguments.len()
        )));
    }

    let rotation = arguments.remove(arguments.len() - 1);
    let mut arguments = arguments.into_iter();
    let (Some(exposure), Some(vertex_count)) = (arguments.next(), arguments.next()) else {
        return Err(ParseErrorKind::InvalidMacroArgument("outline arguments missing".to_string()));
    };

    let vertex_count = match vertex_count.value() {
        Some(value) if value >= 0.0 && value.fract() == 0.0 => value as usize,
        _ => {
            return Err(ParseErrorKind::InvalidMacroArgument(format!(
                "outline vertex count must be a whole number, found {:?}",
                vertex_count
            )))
        }
    };

    let coordinates: Vec<MacroArgument> = arguments.collect();
    // the start point is not counted as a vertex
    let residual = coordinates.len().saturating_sub(2);
    if coordinates.len() % 2 != 0 || residual != 2 * vertex_count {
        return Err(ParseErrorKind::VertexCountMismatch {
            declared: vertex_count,
            coordinates: residual,
        });
    }

    let points = coordinates
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();

    Ok(OutlinePrimitive {
        exposure,
        vertex_count,
        points,
        rotation,
    })
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ApertureMacro {
    name: String,
    primitives: Vec<MacroPrimitive>,
    /// Index `n` holds the variable written as `$n`, index 0 is never used.
    modifiers: Vec<Option<VariableId>>,
    next_variable: usize,
}

impl ApertureMacro {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitives: vec![],
            modifiers: vec![],
            next_variable: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primitives(&self) -> &[MacroPrimitive] {
        &self.primitives
    }

    pub fn modifiers(&self) -> &[Option<VariableId>] {
        &self.modifiers
    }

    /// Returns the variable in modifier slot `slot`, allocating it on first reference.
    pub fn variable(&mut self, slot: usize) -> VariableId {
        if self.modifiers.len() <= slot {
            self.modifiers.resize(slot + 1, None);
        }

        match self.modifiers[slot] {
            Some(variable) => variable,
            None => {
                let variable = VariableId(self.next_variable);
                self.next_variable += 1;
                self.modifiers[slot] = Some(variable);
                variable
            }
        }
    }

    /// Replaces the modifier slots, e.g. to renumber variables.
    pub fn set_modifiers(&mut self, modifiers: Vec<Option<VariableId>>) {
        self.modifiers = modifiers;
    }

    pub fn slot_of(&self, variable: VariableId) -> Option<usize> {
        self.modifiers
            .iter()
            .position(|slot| *slot == Some(variable))
    }

    pub fn push_comment(&mut self, text: impl Into<String>) {
        self.primitives
            .push(MacroPrimitive::Comment(text.into()));
    }

    pub fn push_definition(&mut self, variable: u32, expression: impl Into<String>) {
        self.primitives
            .push(MacroPrimitive::Definition {
                variable,
                expression: expression.into(),
            });
    }

    pub fn push_primitive(&mut self, code: u32, arguments: Vec<MacroArgument>) -> Result<(), ParseErrorKind> {
        let primitive = MacroPrimitive::from_arguments(code, arguments)?;
        trace!("macro '{}', primitive: {:?}", self.name, primitive);
        self.primitives.push(primitive);
        Ok(())
    }

    fn format_argument(&self, argument: &MacroArgument) -> Result<String, UnparseError> {
        match argument {
            MacroArgument::Value(value) => Ok(value.to_string()),
            MacroArgument::Variable(variable) => match self.slot_of(*variable) {
                Some(slot) => Ok(format!("${}", slot)),
                None => {
                    warn!("Variable not in modifier slots. macro: '{}', variable: {:?}", self.name, variable);
                    Err(UnparseError::UnboundMacroVariable(self.name.clone()))
                }
            },
            MacroArgument::Expression(expression) => Ok(expression.clone()),
        }
    }

    pub fn format_primitive(&self, primitive: &MacroPrimitive) -> Result<String, UnparseError> {
        let line = match primitive {
            MacroPrimitive::Comment(text) => format!("0 {}*", text),
            MacroPrimitive::Definition {
                variable,
                expression,
            } => format!("${}={}*", variable, expression),
            MacroPrimitive::Outline(outline) => {
                let mut fields = vec![
                    "4".to_string(),
                    self.format_argument(&outline.exposure)?,
                    outline.vertex_count.to_string(),
                ];
                for (x, y) in &outline.points {
                    fields.push(self.format_argument(x)?);
                    fields.push(self.format_argument(y)?);
                }
                fields.push(self.format_argument(&outline.rotation)?);
                format!("{}*", fields.join(","))
            }
            _ => {
                let code = primitive.code().unwrap_or_default();
                let mut fields = vec![code.to_string()];
                for argument in primitive.arguments() {
                    fields.push(self.format_argument(argument)?);
                }
                format!("{}*", fields.join(","))
            }
        };
        Ok(line)
    }

    /// One `*`-terminated line per primitive.
    pub fn to_lines(&self) -> Result<Vec<String>, UnparseError> {
        self.primitives
            .iter()
            .map(|primitive| self.format_primitive(primitive))
            .collect()
    }

    /// Binds `parameters` to `$1..$n` and returns the primitives with every argument reduced to a value.
    ///
    /// Comments and definitions are consumed.
    pub fn instantiate(&self, parameters: &[f64]) -> Result<Vec<MacroPrimitive>, ExpressionEvaluationError> {
        let mut context = MacroContext::from_parameters(parameters);
        let mut result = vec![];

        for primitive in &self.primitives {
            match primitive {
                MacroPrimitive::Comment(_) => {}
                MacroPrimitive::Definition {
                    variable,
                    expression,
                } => {
                    let value = evaluate_expression(expression, &context)?;
                    context.put(*variable, value)?;
                }
                _ => {
                    let resolved = primitive.try_map_arguments(|argument| {
                        self.resolve_argument(argument, &context)
                            .map(MacroArgument::Value)
                    })?;
                    result.push(resolved);
                }
            }
        }

        trace!("instantiated macro '{}', context: {:?}", self.name, context);
        Ok(result)
    }

    fn resolve_argument(&self, argument: &MacroArgument, context: &MacroContext) -> Result<f64, ExpressionEvaluationError> {
        match argument {
            MacroArgument::Value(value) => Ok(*value),
            MacroArgument::Variable(variable) => {
                let slot = self
                    .slot_of(*variable)
                    .ok_or(ExpressionEvaluationError::InvalidVariable(0))?;
                context.get(slot as u32)
            }
            MacroArgument::Expression(expression) => evaluate_expression(expression, context),
        }
    }
}

impl Display for ApertureMacro {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let lines = self
            .to_lines()
            .map_err(|_| std::fmt::Error)?;
        write!(f, "{}", lines.join("\n"))
    }
}

/// Aperture macros, keyed by name, in definition order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MacroTable {
    macros: Vec<ApertureMacro>,
}

impl MacroTable {
    pub fn get(&self, name: &str) -> Option<&ApertureMacro> {
        self.macros
            .iter()
            .find(|aperture_macro| aperture_macro.name == name)
    }

    /// Returns the macro named `name`, creating an empty one if it does not exist yet.
    pub fn get_or_insert(&mut self, name: &str) -> &mut ApertureMacro {
        let index = match self
            .macros
            .iter()
            .position(|aperture_macro| aperture_macro.name == name)
        {
            Some(index) => index,
            None => {
                self.macros.push(ApertureMacro::new(name));
                self.macros.len() - 1
            }
        };
        &mut self.macros[index]
    }

    /// Adds the macro, replacing any existing macro with the same name.
    pub fn insert(&mut self, aperture_macro: ApertureMacro) {
        match self
            .macros
            .iter_mut()
            .find(|existing| existing.name == aperture_macro.name)
        {
            Some(existing) => *existing = aperture_macro,
            None => self.macros.push(aperture_macro),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApertureMacro> {
        self.macros.iter()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

#[cfg(test)]
mod aperture_macro_tests {
    use rstest::rstest;

    use super::*;

    fn values(values: &[f64]) -> Vec<MacroArgument> {
        values
            .iter()
            .map(|value| MacroArgument::Value(*value))
            .collect()
    }

    #[rstest]
    #[case(1, &[1.0, 1.5, 0.0, 0.0], "1,1,1.5,0,0*")]
    #[case(1, &[1.0, 1.5, 0.0, 0.0, 45.0], "1,1,1.5,0,0,45*")]
    #[case(20, &[1.0, 0.9, 0.0, 0.45, 12.0, 0.45, 0.0], "2,1,0.9,0,0.45,12,0.45,0*")]
    #[case(2, &[1.0, 0.9, 0.0, 0.45, 12.0, 0.45, 0.0], "2,1,0.9,0,0.45,12,0.45,0*")]
    #[case(21, &[1.0, 6.8, 1.2, 3.4, 0.6, 0.0], "21,1,6.8,1.2,3.4,0.6,0*")]
    #[case(22, &[1.0, 6.8, 1.2, 0.0, 0.0, 0.0], "22,1,6.8,1.2,0,0,0*")]
    #[case(4, &[1.0, 4.0, 0.1, 0.1, 0.5, 0.1, 0.5, 0.5, 0.1, 0.5, 0.1, 0.1, 0.0], "4,1,4,0.1,0.1,0.5,0.1,0.5,0.5,0.1,0.5,0.1,0.1,0*")]
    #[case(5, &[1.0, 8.0, 0.0, 0.0, 8.0, 0.0], "5,1,8,0,0,8,0*")]
    #[case(6, &[0.0, 0.0, 5.0, 0.5, 0.5, 2.0, 0.1, 6.0, 0.0], "6,0,0,5,0.5,0.5,2,0.1,6,0*")]
    #[case(7, &[1.0, 2.0, 4.0, 3.0, 0.0, 0.0], "7,1,2,4,3,0,0*")]
    fn primitive_lines(#[case] code: u32, #[case] arguments: &[f64], #[case] expected: &str) {
        // given
        let mut aperture_macro = ApertureMacro::new("TEST");

        // when
        aperture_macro
            .push_primitive(code, values(arguments))
            .unwrap();

        // then
        assert_eq!(aperture_macro.to_lines(), Ok(vec![expected.to_string()]));
    }

    #[test]
    fn comment_and_definition_lines() {
        // given
        let mut aperture_macro = ApertureMacro::new("TEST");

        // when
        aperture_macro.push_comment("This is a comment");
        aperture_macro.push_definition(3, "$1+$2");

        // then
        assert_eq!(
            aperture_macro.to_lines().unwrap(),
            vec!["0 This is a comment*", "$3=$1+$2*"]
        );
    }

    #[test]
    fn variables_render_as_slot_index() {
        // given
        let mut aperture_macro = ApertureMacro::new("VARS");
        let first = aperture_macro.variable(1);
        let second = aperture_macro.variable(2);

        // when
        aperture_macro
            .push_primitive(1, vec![1.0.into(), 1.5.into(), first.into(), 0.0.into()])
            .unwrap();
        let mut outline = values(&[1.0, 4.0, 0.1, 0.1, 0.5]);
        outline.push(second.into());
        outline.extend(values(&[0.5, 0.5, 0.1]));
        outline.push(first.into());
        outline.extend(values(&[0.1, 0.1, 0.0]));
        aperture_macro
            .push_primitive(4, outline)
            .unwrap();

        // then
        assert_eq!(aperture_macro.to_lines().unwrap(), vec![
            "1,1,1.5,$1,0*",
            "4,1,4,0.1,0.1,0.5,$2,0.5,0.5,0.1,$1,0.1,0.1,0*",
        ]);
    }

    #[test]
    fn unbound_variables_are_not_written() {
        // given
        let mut aperture_macro = ApertureMacro::new("VARS");
        let diameter = aperture_macro.variable(1);
        aperture_macro
            .push_primitive(1, vec![1.0.into(), diameter.into(), 0.0.into(), 0.0.into()])
            .unwrap();

        // when
        aperture_macro.set_modifiers(vec![]);

        // then
        assert_eq!(
            aperture_macro.to_lines(),
            Err(UnparseError::UnboundMacroVariable("VARS".to_string()))
        );
    }

    #[test]
    fn repeated_variable_references_share_identity() {
        // given
        let mut aperture_macro = ApertureMacro::new("VARS");

        // when
        let first = aperture_macro.variable(2);
        let again = aperture_macro.variable(2);
        let other = aperture_macro.variable(1);

        // then
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(aperture_macro.modifiers().len(), 3);
        assert_eq!(aperture_macro.slot_of(first), Some(2));
    }

    #[test]
    fn outline_points() {
        // given
        let mut aperture_macro = ApertureMacro::new("OUTLINE");

        // when
        aperture_macro
            .push_primitive(4, values(&[1.0, 3.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 30.0]))
            .unwrap();

        // then
        let MacroPrimitive::Outline(outline) = &aperture_macro.primitives()[0] else {
            panic!("expected outline");
        };
        assert_eq!(outline.vertex_count, 3);
        assert_eq!(outline.points.len(), 4);
        assert_eq!(outline.points[1], (MacroArgument::Value(1.0), MacroArgument::Value(0.0)));
        assert_eq!(outline.rotation, MacroArgument::Value(30.0));
    }

    #[rstest]
    #[case(&[1.0, 4.0, 0.0, 0.0, 1.0, 0.0, 0.0])]
    #[case(&[1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0])]
    fn outline_vertex_count_mismatch(#[case] arguments: &[f64]) {
        // given
        let mut aperture_macro = ApertureMacro::new("OUTLINE");

        // when
        let result = aperture_macro.push_primitive(4, values(arguments));

        // then
        assert!(matches!(result, Err(ParseErrorKind::VertexCountMismatch { .. })));
    }

    #[rstest]
    #[case(&[0.0, 0.0, 4.0, 3.0, 4.0, 0.0])]
    #[case(&[0.0, 0.0, 4.0, 3.0, 5.0, 0.0])]
    fn thermal_gap_must_be_less_than_outer_diameter(#[case] arguments: &[f64]) {
        let mut aperture_macro = ApertureMacro::new("THERMAL");

        let result = aperture_macro.push_primitive(7, values(arguments));

        assert_eq!(result, Err(ParseErrorKind::InvalidThermalGap));
    }

    #[rstest]
    #[case(7, &[0.0, 0.0, 4.0, 3.0, 0.5, 45.0], false)]
    #[case(7, &[0.0, 0.0, 4.0, 3.0, 0.5, 0.0], true)]
    #[case(7, &[1.0, 2.0, 4.0, 3.0, 0.5, 45.0], true)]
    #[case(5, &[1.0, 8.0, 0.0, 0.0, 8.0, 30.0], false)]
    #[case(5, &[1.0, 8.0, 1.0, 0.0, 8.0, 30.0], true)]
    #[case(6, &[0.0, 0.0, 5.0, 0.5, 0.5, 2.0, 0.1, 6.0, 10.0], false)]
    fn rotation_of_primitives_centered_on_origin(
        #[case] code: u32,
        #[case] arguments: &[f64],
        #[case] succeeds: bool,
    ) {
        // given
        let mut aperture_macro = ApertureMacro::new("ROTATED");

        // when
        let result = aperture_macro.push_primitive(code, values(arguments));

        // then
        match succeeds {
            true => assert_eq!(result, Ok(())),
            false => assert_eq!(result, Err(ParseErrorKind::InvalidMacroRotation(code))),
        }
    }

    #[test]
    fn unknown_primitive_code() {
        let mut aperture_macro = ApertureMacro::new("UNKNOWN");

        let result = aperture_macro.push_primitive(3, values(&[1.0]));

        assert_eq!(result, Err(ParseErrorKind::UnrecognizedPrimitive(3)));
    }

    #[test]
    fn wrong_argument_count() {
        let mut aperture_macro = ApertureMacro::new("SHORT");

        let result = aperture_macro.push_primitive(21, values(&[1.0, 2.0]));

        assert!(matches!(result, Err(ParseErrorKind::InvalidMacroArgument(_))));
    }

    #[test]
    fn instantiate_substitutes_variables_and_definitions() {
        // given
        let mut aperture_macro = ApertureMacro::new("DONUT");
        let diameter = aperture_macro.variable(1);
        aperture_macro.push_comment("donut");
        aperture_macro.push_definition(3, "$1x0.5");
        aperture_macro
            .push_primitive(1, vec![1.0.into(), diameter.into(), 0.0.into(), 0.0.into()])
            .unwrap();
        aperture_macro
            .push_primitive(1, vec![
                0.0.into(),
                MacroArgument::Expression("$3".to_string()),
                0.0.into(),
                MacroArgument::Expression("$2-1".to_string()),
            ])
            .unwrap();

        // when
        let primitives = aperture_macro
            .instantiate(&[2.0, 1.5])
            .unwrap();

        // then
        assert_eq!(primitives.len(), 2);
        assert_eq!(
            primitives[0],
            MacroPrimitive::Circle(CirclePrimitive {
                exposure: 1.0.into(),
                diameter: 2.0.into(),
                center_x: 0.0.into(),
                center_y: 0.0.into(),
                rotation: None,
            })
        );
        assert_eq!(primitives[0].exposure(), Some(Exposure::Add));
        assert_eq!(primitives[1].exposure(), Some(Exposure::CutOut));
        let MacroPrimitive::Circle(cut_out) = &primitives[1] else {
            panic!("expected circle");
        };
        assert_eq!(cut_out.diameter, MacroArgument::Value(1.0));
        assert_eq!(cut_out.center_y, MacroArgument::Value(0.5));
    }

    #[test]
    fn instantiate_with_missing_parameter() {
        // given
        let mut aperture_macro = ApertureMacro::new("MISSING");
        let variable = aperture_macro.variable(2);
        aperture_macro
            .push_primitive(1, vec![1.0.into(), variable.into(), 0.0.into(), 0.0.into()])
            .unwrap();

        // when
        let result = aperture_macro.instantiate(&[1.0]);

        // then
        assert_eq!(result, Err(ExpressionEvaluationError::UndefinedVariable(2)));
    }

    #[test]
    fn table_lookup_and_redefinition() {
        // given
        let mut table = MacroTable::default();
        table
            .get_or_insert("A")
            .push_comment("first");

        // when
        table
            .get_or_insert("A")
            .push_comment("second");
        table.insert(ApertureMacro::new("B"));

        // then
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("A").unwrap().primitives().len(), 2);
        assert!(table.get("C").is_none());
    }
}
