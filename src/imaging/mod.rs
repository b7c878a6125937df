pub mod codec;
pub mod extract;
pub mod geometry;
pub mod upload;

pub use codec::EncodedImage;
pub use geometry::{to_natural_rect, DisplayedRect, ImageDimensions, NaturalRect};
