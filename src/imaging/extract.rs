use image::{DynamicImage, GenericImageView};

use crate::errors::{LocatorError, LocatorResult};
use crate::imaging::codec::EncodedImage;
use crate::imaging::geometry::NaturalRect;

/// Copy `rect` out of `image` into a new raster and encode it as PNG.
///
/// `rect` must lie inside the image; anything else is reported as
/// [`LocatorError::OutOfBounds`] rather than clipped.
pub fn extract(image: &DynamicImage, rect: &NaturalRect) -> LocatorResult<EncodedImage> {
    let (w, h) = image.dimensions();
    if !rect.fits_within(w, h) {
        return Err(LocatorError::OutOfBounds {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            image_width: w,
            image_height: h,
        });
    }

    let cropped = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    let encoded = EncodedImage::encode_png(&cropped)?;
    tracing::debug!(
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        bytes = encoded.len(),
        "sub-image extracted"
    );
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::tests::pattern;

    #[test]
    fn test_extracted_png_has_rect_dimensions() {
        let img = pattern(64, 48);
        let rect = NaturalRect { x: 10, y: 5, width: 17, height: 23 };
        let out = extract(&img, &rect).unwrap();
        assert!(out.is_png());
        assert_eq!(out.dimensions().unwrap(), (17, 23));
    }

    #[test]
    fn test_extracted_pixels_match_source() {
        let img = pattern(32, 32);
        let rect = NaturalRect { x: 4, y: 9, width: 3, height: 2 };
        let out = extract(&img, &rect).unwrap().decode().unwrap();
        for dy in 0..2 {
            for dx in 0..3 {
                assert_eq!(out.get_pixel(dx, dy), img.get_pixel(4 + dx, 9 + dy));
            }
        }
    }

    #[test]
    fn test_full_image_rect_is_allowed() {
        let img = pattern(8, 8);
        let rect = NaturalRect { x: 0, y: 0, width: 8, height: 8 };
        assert_eq!(extract(&img, &rect).unwrap().dimensions().unwrap(), (8, 8));
    }

    #[test]
    fn test_out_of_bounds_is_rejected() {
        let img = pattern(8, 8);
        for rect in [
            NaturalRect { x: 4, y: 0, width: 5, height: 2 },
            NaturalRect { x: 0, y: 7, width: 1, height: 2 },
            NaturalRect { x: 0, y: 0, width: 0, height: 2 },
            NaturalRect { x: u32::MAX, y: 0, width: 2, height: 2 },
        ] {
            let err = extract(&img, &rect).unwrap_err();
            assert!(matches!(err, LocatorError::OutOfBounds { .. }), "{rect:?}");
        }
    }
}
