/// Rectangles in displayed vs. natural pixel space, and the transform between
/// them.
///
/// Rounding is half-away-from-zero (`f64::round`) for every component.
use serde::{Deserialize, Serialize};

use crate::errors::{LocatorError, LocatorResult};

/// Selection rectangle in the coordinate space of the rendered (possibly
/// scaled) image element. Only meaningful against the dimensions it was drawn
/// on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Same rectangle with non-negative width/height (a drag towards the
    /// top-left produces negative extents).
    fn normalized(&self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Self { x, y, width, height }
    }
}

/// Rectangle in the image's true pixel space. Always non-empty and inside the
/// image it was derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl NaturalRect {
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= width as u64
            && self.bottom() <= height as u64
    }
}

/// Displayed and natural size of one loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub displayed_width: u32,
    pub displayed_height: u32,
    pub natural_width: u32,
    pub natural_height: u32,
}

impl ImageDimensions {
    pub fn new(displayed: (u32, u32), natural: (u32, u32)) -> Self {
        Self {
            displayed_width: displayed.0,
            displayed_height: displayed.1,
            natural_width: natural.0,
            natural_height: natural.1,
        }
    }

    pub fn is_measured(&self) -> bool {
        self.displayed_width > 0 && self.displayed_height > 0
    }

    /// `(scale_x, scale_y)` from displayed to natural space.
    pub fn scale_factors(&self) -> LocatorResult<(f64, f64)> {
        if !self.is_measured() {
            return Err(LocatorError::UnmeasuredImage {
                width: self.displayed_width,
                height: self.displayed_height,
            });
        }
        Ok((
            self.natural_width as f64 / self.displayed_width as f64,
            self.natural_height as f64 / self.displayed_height as f64,
        ))
    }
}

/// Map a displayed-space selection to natural pixel space.
///
/// Each of x, y, width and height is scaled and rounded independently. The
/// result is then clipped to the natural image; a selection that ends up with
/// no pixels fails with [`LocatorError::EmptySelection`].
pub fn to_natural_rect(rect: &DisplayedRect, dims: &ImageDimensions) -> LocatorResult<NaturalRect> {
    let (scale_x, scale_y) = dims.scale_factors()?;
    let rect = rect.normalized();

    let (x, width) = clip_span(
        (rect.x * scale_x).round(),
        (rect.width * scale_x).round(),
        dims.natural_width,
    );
    let (y, height) = clip_span(
        (rect.y * scale_y).round(),
        (rect.height * scale_y).round(),
        dims.natural_height,
    );

    if width == 0 || height == 0 {
        return Err(LocatorError::EmptySelection);
    }

    let natural = NaturalRect { x, y, width, height };
    tracing::debug!(
        ?rect,
        ?natural,
        scale_x,
        scale_y,
        "selection mapped to natural space"
    );
    Ok(natural)
}

/// Clip the span `[start, start + len)` to `[0, limit)`.
fn clip_span(start: f64, len: f64, limit: u32) -> (u32, u32) {
    if !start.is_finite() || !len.is_finite() {
        return (0, 0);
    }
    let limit = limit as f64;
    let lo = start.clamp(0.0, limit);
    let hi = (start + len).clamp(0.0, limit);
    let lo_px = lo as u32;
    (lo_px, (hi - lo).max(0.0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(displayed: (u32, u32), natural: (u32, u32)) -> ImageDimensions {
        ImageDimensions::new(displayed, natural)
    }

    #[test]
    fn test_half_scale_display_doubles_coordinates() {
        let d = dims((512, 384), (1024, 768));
        let r = to_natural_rect(&DisplayedRect::new(100.0, 100.0, 50.0, 50.0), &d).unwrap();
        assert_eq!(
            r,
            NaturalRect { x: 200, y: 200, width: 100, height: 100 }
        );
    }

    #[test]
    fn test_unmeasured_width_or_height_is_rejected() {
        let rect = DisplayedRect::new(1.0, 1.0, 5.0, 5.0);
        for d in [dims((0, 384), (1024, 768)), dims((512, 0), (1024, 768)), dims((0, 0), (1, 1))] {
            let err = to_natural_rect(&rect, &d).unwrap_err();
            assert!(matches!(err, LocatorError::UnmeasuredImage { .. }), "{err:?}");
        }
    }

    #[test]
    fn test_scaling_is_proportional_within_one_pixel() {
        let cases = [
            ((300, 200), (1080, 720)),
            ((375, 812), (1125, 2436)),
            ((640, 480), (640, 480)),
            ((1000, 700), (333, 233)),
        ];
        for (displayed, natural) in cases {
            let d = dims(displayed, natural);
            let rect = DisplayedRect::new(
                displayed.0 as f64 * 0.1,
                displayed.1 as f64 * 0.2,
                displayed.0 as f64 * 0.37,
                displayed.1 as f64 * 0.41,
            );
            let r = to_natural_rect(&rect, &d).unwrap();
            let expected_w = rect.width / displayed.0 as f64 * natural.0 as f64;
            let expected_h = rect.height / displayed.1 as f64 * natural.1 as f64;
            assert!((r.width as f64 - expected_w).abs() <= 1.0, "{r:?} vs {expected_w}");
            assert!((r.height as f64 - expected_h).abs() <= 1.0, "{r:?} vs {expected_h}");
            assert!(r.fits_within(natural.0, natural.1));
        }
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        // scale 1.5: 1 -> 1.5 -> 2, 3 -> 4.5 -> 5
        let d = dims((200, 200), (300, 300));
        let r = to_natural_rect(&DisplayedRect::new(1.0, 1.0, 3.0, 3.0), &d).unwrap();
        assert_eq!((r.x, r.y, r.width, r.height), (2, 2, 5, 5));
    }

    #[test]
    fn test_selection_past_edge_is_clipped() {
        let d = dims((100, 100), (200, 200));
        let r = to_natural_rect(&DisplayedRect::new(90.0, -5.0, 20.0, 20.0), &d).unwrap();
        assert_eq!(r, NaturalRect { x: 180, y: 0, width: 20, height: 30 });
        assert!(r.fits_within(200, 200));
    }

    #[test]
    fn test_reverse_drag_is_normalized() {
        let d = dims((100, 100), (100, 100));
        let r = to_natural_rect(&DisplayedRect::new(50.0, 60.0, -10.0, -20.0), &d).unwrap();
        assert_eq!(r, NaturalRect { x: 40, y: 40, width: 10, height: 20 });
    }

    #[test]
    fn test_tiny_selection_is_empty() {
        let d = dims((1000, 1000), (100, 100));
        let err = to_natural_rect(&DisplayedRect::new(10.0, 10.0, 2.0, 2.0), &d).unwrap_err();
        assert!(matches!(err, LocatorError::EmptySelection));
    }

    #[test]
    fn test_selection_outside_image_is_empty() {
        let d = dims((100, 100), (100, 100));
        let err = to_natural_rect(&DisplayedRect::new(150.0, 10.0, 20.0, 20.0), &d).unwrap_err();
        assert!(matches!(err, LocatorError::EmptySelection));
    }
}
