use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;

use crate::driver::Driver;
use crate::errors::{LocatorError, LocatorResult};
use crate::imaging::EncodedImage;

/// Source of the current device screen.
#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    async fn capture(&self) -> LocatorResult<EncodedImage>;
}

/// Screenshots taken through the automation session.
pub struct DriverScreenshotSource {
    driver: Arc<dyn Driver>,
}

impl DriverScreenshotSource {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ScreenshotSource for DriverScreenshotSource {
    async fn capture(&self) -> LocatorResult<EncodedImage> {
        let b64 = self
            .driver
            .take_screenshot()
            .await
            .map_err(|e| LocatorError::CaptureFailed(e.to_string()))?;
        EncodedImage::from_base64(&b64)
            .map_err(|e| LocatorError::CaptureFailed(format!("bad screenshot payload: {e}")))
    }
}

/// A loaded screenshot: the encoded payload, its natural size and the decoded
/// raster used for cropping.
#[derive(Clone, Serialize)]
pub struct Screenshot {
    pub image: EncodedImage,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
    #[serde(skip)]
    raster: Arc<DynamicImage>,
}

impl Screenshot {
    /// Decode `image` once and keep the raster alongside it. Captures in any
    /// other format are re-encoded as PNG.
    pub fn decode(image: EncodedImage) -> LocatorResult<Self> {
        let raster = image.decode()?;
        let (width, height) = raster.dimensions();
        if width == 0 || height == 0 {
            return Err(LocatorError::Decode("screenshot has no pixels".into()));
        }
        let image = if image.is_png() {
            image
        } else {
            tracing::debug!(format = ?image.format(), "normalizing screenshot to PNG");
            EncodedImage::encode_png(&raster)?
        };
        Ok(Self {
            image,
            width,
            height,
            captured_at: Utc::now(),
            raster: Arc::new(raster),
        })
    }

    /// [`Screenshot::decode`] on the blocking pool.
    pub async fn load(image: EncodedImage) -> LocatorResult<Self> {
        tokio::task::spawn_blocking(move || Self::decode(image))
            .await
            .map_err(|e| LocatorError::Decode(format!("join: {e}")))?
    }

    pub fn raster(&self) -> &DynamicImage {
        &self.raster
    }

    pub fn natural_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl PartialEq for Screenshot {
    fn eq(&self, other: &Self) -> bool {
        self.image == other.image && self.captured_at == other.captured_at
    }
}

impl fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screenshot")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.image.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
