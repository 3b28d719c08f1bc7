#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::spacial::{Position, Vector};

pub mod bounding_box;

pub use bounding_box::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mirroring {
    pub x: bool,
    pub y: bool,
}

impl From<[bool; 2]> for Mirroring {
    fn from(value: [bool; 2]) -> Self {
        Self {
            x: value[0],
            y: value[1],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Line {
    pub start: Position,
    pub end: Position,
}

impl Line {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start,
            end,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&[self.start, self.end])
    }
}

/// A circular arc, always counterclockwise from `start` to `end`.
///
/// A clockwise arc is stored by swapping its endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Arc {
    pub center: Position,
    pub start: Position,
    pub end: Position,
}

impl Arc {
    pub fn new(center: Position, start: Position, end: Position) -> Self {
        Self {
            center,
            start,
            end,
        }
    }

    pub fn radius(&self) -> f64 {
        let offset = self.start - self.center;
        offset.x.hypot(offset.y)
    }

    /// Offset from the start point to the center, as written in I/J fields.
    pub fn center_offset(&self) -> Vector {
        self.center - self.start
    }

    /// The box of the full circle, which always contains the arc.
    pub fn bounding_box(&self) -> BoundingBox {
        let radius = self.radius();
        BoundingBox {
            min: Position::new(self.center.x - radius, self.center.y - radius),
            max: Position::new(self.center.x + radius, self.center.y + radius),
        }
    }
}

/// A geometry element drawn or flashed with an aperture.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Geometry {
    Line(Line),
    /// A flash of the aperture at a position.
    Point(Position),
    Arc(Arc),
}

impl Geometry {
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Geometry::Line(line) => line.bounding_box(),
            Geometry::Point(position) => BoundingBox::from_points(&[*position]),
            Geometry::Arc(arc) => arc.bounding_box(),
        }
    }
}

impl From<Line> for Geometry {
    fn from(value: Line) -> Self {
        Geometry::Line(value)
    }
}

impl From<Arc> for Geometry {
    fn from(value: Arc) -> Self {
        Geometry::Arc(value)
    }
}
