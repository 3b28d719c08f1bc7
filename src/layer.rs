#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::aperture::Aperture;
use crate::geometry::{Arc, BoundingBox, Geometry, Line};
use crate::spacial::{Position, Vector};
use crate::units::Unit;

pub mod parser;
pub mod unparser;

pub use parser::*;
pub use unparser::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Polarity {
    #[default]
    Dark,
    Clear,
}

impl Polarity {
    /// The `LP` directive letter.
    pub fn code(&self) -> char {
        match self {
            Polarity::Dark => 'D',
            Polarity::Clear => 'C',
        }
    }
}

/// A finished layer, geometry is grouped by aperture in the order the apertures were first used.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Layer {
    pub name: Option<String>,
    pub polarity: Polarity,
    pub step: Vector,
    /// Repeat counts along X and Y.
    pub repeat: (u32, u32),
    geometry: Vec<(Aperture, Vec<Geometry>)>,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            name: None,
            polarity: Polarity::Dark,
            step: Vector::new(0.0, 0.0),
            repeat: (1, 1),
            geometry: vec![],
        }
    }
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry(&self) -> &[(Aperture, Vec<Geometry>)] {
        &self.geometry
    }

    pub fn geometry_for(&self, aperture: &Aperture) -> Option<&[Geometry]> {
        self.geometry
            .iter()
            .find(|(candidate, _)| candidate == aperture)
            .map(|(_, elements)| elements.as_slice())
    }

    /// Returns the geometry list for `aperture`, adding an empty one if the aperture is not used yet.
    pub fn elements_mut(&mut self, aperture: &Aperture) -> &mut Vec<Geometry> {
        let index = match self
            .geometry
            .iter()
            .position(|(candidate, _)| candidate == aperture)
        {
            Some(index) => index,
            None => {
                self.geometry
                    .push((aperture.clone(), vec![]));
                self.geometry.len() - 1
            }
        };
        &mut self.geometry[index].1
    }

    pub fn push(&mut self, aperture: &Aperture, element: Geometry) {
        self.elements_mut(aperture)
            .push(element);
    }

    pub fn add_line(&mut self, aperture: &Aperture, start: Position, end: Position) {
        self.push(aperture, Geometry::Line(Line::new(start, end)));
    }

    pub fn add_point(&mut self, aperture: &Aperture, position: Position) {
        self.push(aperture, Geometry::Point(position));
    }

    pub fn add_arc(&mut self, aperture: &Aperture, arc: Arc) {
        self.push(aperture, Geometry::Arc(arc));
    }

    pub fn is_empty(&self) -> bool {
        self.geometry
            .iter()
            .all(|(_, elements)| elements.is_empty())
    }

    /// The area covered by the layer's geometry in `unit`, grown by half the aperture size on each side.
    ///
    /// Returns `None` for a layer without geometry.
    pub fn bounds(&self, unit: Unit) -> Option<BoundingBox> {
        let mut bbox = BoundingBox::default();

        for (aperture, elements) in &self.geometry {
            let size = aperture.size(unit);
            for element in elements {
                let element_bbox = element.bounding_box();
                match size {
                    Some(size) => bbox.expand(&element_bbox.inflate(size)),
                    None => bbox.expand(&element_bbox),
                }
            }
        }

        match bbox.is_empty() {
            true => None,
            false => Some(bbox),
        }
    }
}
