#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::spacial::{Position, Size, Vector};

#[derive(Debug, Clone, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    pub min: Position,
    pub max: Position,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Position::new(f64::MAX, f64::MAX),
            max: Position::new(f64::MIN, f64::MIN),
        }
    }
}

impl BoundingBox {
    /// A box of `size`, centered on the origin.
    pub fn from_size(size: Size) -> Self {
        let half = size / 2.0;
        Self {
            min: Position::new(-half.x, -half.y),
            max: Position::new(half.x, half.y),
        }
    }

    /// Note that a bounding box of 0,0 -> 0,0 is NOT empty, e.g. a single flash.
    ///
    /// Only a bounding box which is the same as the one returned by `default` counts as empty.
    pub fn is_empty(&self) -> bool {
        self.eq(&BoundingBox::default())
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn expand(&mut self, other: &BoundingBox) {
        self.min.x = self.min.x.min(other.min.x);
        self.min.y = self.min.y.min(other.min.y);
        self.max.x = self.max.x.max(other.max.x);
        self.max.y = self.max.y.max(other.max.y);
    }

    /// Grows the box outwards on each side by half of `size`.
    pub fn inflate(&self, size: Size) -> Self {
        let half: Vector = size / 2.0;
        Self {
            min: self.min - half,
            max: self.max + half,
        }
    }

    /// Returns the geometric center of the bounding box
    pub fn center(&self) -> Position {
        Position::new(self.min.x + self.max.x, self.min.y + self.max.y) / 2.0
    }

    /// Returns 4 corner points of the bounding box such that the result is useable as a closed path.
    /// ```plaintext
    /// (min_x, min_y) 1 ┌────────────┐ 2 (max_x, min_y)
    ///                  │            │
    /// (min_x, max_y) 4 └────────────┘ 3 (max_x, max_y)
    /// ```
    pub fn vertices(&self) -> Vec<Position> {
        vec![
            Position::new(self.min.x, self.min.y),
            Position::new(self.max.x, self.min.y),
            Position::new(self.max.x, self.max.y),
            Position::new(self.min.x, self.max.y),
        ]
    }

    /// Constructs a bounding box from a list of points
    pub fn from_points(points: &[Position]) -> Self {
        let mut bbox = BoundingBox::default();

        for position in points {
            bbox.min.x = bbox.min.x.min(position.x);
            bbox.min.y = bbox.min.y.min(position.y);
            bbox.max.x = bbox.max.x.max(position.x);
            bbox.max.y = bbox.max.y.max(position.y);
        }

        bbox
    }
}
