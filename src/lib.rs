mod aperture;
mod aperture_macro;
mod coordinates;
mod error;
mod expressions;
mod geometry;
mod gerber;
mod layer;
mod parser;
pub mod spacial;
mod units;

#[cfg(feature = "testing")]
pub mod testing;

pub use aperture::*;
pub use aperture_macro::*;
pub use coordinates::*;
pub use error::*;
pub use expressions::*;
pub use geometry::*;
pub use gerber::*;
pub use layer::*;
pub use parser::*;
pub use units::*;
