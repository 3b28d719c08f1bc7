use crate::aperture::Aperture;
use crate::coordinates::ZeroOmission;
use crate::gerber::Gerber;
use crate::spacial::Position;
use crate::units::{Unit, UnitValue};

pub fn dump_gerber_source(gerber: &Gerber) {
    let gerber_source = gerber_to_source(gerber);

    println!("Gerber source:\n{}", gerber_source);
}

pub fn gerber_to_source(gerber: &Gerber) -> String {
    gerber
        .unparse()
        .expect("Could not generate Gerber code")
}

/// A millimeter document, format 2.4 with leading zero omission, without any apertures or layers.
pub fn empty_document() -> Gerber {
    let mut gerber = Gerber::new();
    gerber.set_units(Unit::Millimeter);
    gerber.set_coordinate_format(2, 4);
    gerber.set_zero_omission(ZeroOmission::Leading);
    gerber
}

/// A document with one layer holding a closed rectangular path, drawn counterclockwise from the origin.
pub fn rectangle_document(width: f64, height: f64, diameter: f64) -> Gerber {
    let mut gerber = empty_document();
    let aperture = Aperture::circle(UnitValue::millimeter(diameter));
    gerber.new_aperture(aperture.clone());

    let corners = [
        Position::new(0.0, 0.0),
        Position::new(width, 0.0),
        Position::new(width, height),
        Position::new(0.0, height),
    ];
    let layer = gerber.new_layer();
    for (index, start) in corners.iter().enumerate() {
        layer.add_line(&aperture, *start, corners[(index + 1) % corners.len()]);
    }
    gerber
}

pub mod geometry {
    use std::f64::consts::PI;

    use crate::spacial::Position;

    /// generate star points, starting with the point at the top of the star, alternating between outer and inner radius
    ///
    /// coordinates are rounded to 4 decimal places so they are written without loss
    pub fn calculate_star_points(outer_radius: f64, inner_radius: f64, center: Position) -> Vec<Position> {
        let angle_step = (2.0 * PI) / 10.0;
        let round = |value: f64| (value * 10000.0).round() / 10000.0;

        (0..10)
            .map(|i| {
                let radius = if i % 2 == 0 { outer_radius } else { inner_radius };
                let angle = PI / 2.0 - angle_step * i as f64;
                Position::new(
                    round(center.x + radius * angle.cos()),
                    round(center.y + radius * angle.sin()),
                )
            })
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn star_points() {
            // when
            let points = calculate_star_points(1.0, 0.5, Position::origin());

            // then
            assert_eq!(points.len(), 10);
            assert_eq!(points[0], Position::new(0.0, 1.0));
            assert_eq!(points[1], Position::new(0.2939, 0.4045));
            assert_eq!(points[5], Position::new(0.0, -0.5));
        }
    }
}

pub mod macros {
    use super::geometry::calculate_star_points;
    use crate::aperture_macro::{ApertureMacro, MacroArgument};
    use crate::spacial::Position;

    /// A macro with a single outline primitive in the shape of a five pointed star.
    pub fn star_outline_macro(name: &str, outer_radius: f64, inner_radius: f64) -> ApertureMacro {
        let star_points = calculate_star_points(outer_radius, inner_radius, Position::origin());

        let mut arguments = vec![MacroArgument::Value(1.0), MacroArgument::Value(star_points.len() as f64)];
        // the outline is closed by repeating the first point
        for point in star_points
            .iter()
            .chain(star_points.first())
        {
            arguments.push(MacroArgument::Value(point.x));
            arguments.push(MacroArgument::Value(point.y));
        }
        arguments.push(MacroArgument::Value(0.0));

        let mut aperture_macro = ApertureMacro::new(name);
        aperture_macro.push_comment("five pointed star");
        aperture_macro
            .push_primitive(4, arguments)
            .expect("valid outline");
        aperture_macro
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::aperture::Aperture;
        use crate::aperture_macro::MacroPrimitive;
        use crate::gerber::Gerber;
        use crate::spacial::Position;
        use crate::testing::{empty_document, gerber_to_source};

        #[test]
        fn star_outline() {
            // when
            let aperture_macro = star_outline_macro("STAR", 1.0, 0.5);

            // then
            let MacroPrimitive::Outline(outline) = &aperture_macro.primitives()[1] else {
                panic!("expected outline");
            };
            assert_eq!(outline.vertex_count, 10);
            assert_eq!(outline.points.len(), 11);
            assert_eq!(outline.points.first(), outline.points.last());
        }

        #[test]
        fn star_outline_round_trip() {
            // given
            let mut gerber = empty_document();
            gerber.define_macro(star_outline_macro("STAR", 1.0, 0.5));
            let aperture = Aperture::macro_reference("STAR", vec![]);
            gerber
                .new_layer()
                .add_point(&aperture, Position::new(5.0, 5.0));

            // when
            let source = gerber_to_source(&gerber);
            let parsed: Gerber = source.parse().unwrap();

            // then
            assert_eq!(parsed.macros(), gerber.macros());
            assert_eq!(parsed.apertures().get(10), Some(&aperture));
        }
    }
}
