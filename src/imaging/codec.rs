use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{LocatorError, LocatorResult};

/// An encoded image payload. Everything the workflow sends to the matcher is
/// PNG; match visualizations are carried as the backend returned them.
///
/// Internally the bytes are kept raw and shared; across serde boundaries the
/// payload is always base64 text.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl EncodedImage {
    /// Wrap raw encoded bytes, sniffing the format from the magic number.
    pub fn from_bytes(bytes: Vec<u8>) -> LocatorResult<Self> {
        let format = image::guess_format(&bytes)
            .map_err(|e| LocatorError::Decode(format!("unrecognised image data: {e}")))?;
        Ok(Self {
            bytes: Arc::from(bytes),
            format,
        })
    }

    /// Parse base64 text. A `data:image/...;base64,` prefix is accepted and
    /// stripped.
    pub fn from_base64(text: &str) -> LocatorResult<Self> {
        Self::from_bytes(decode_base64_payload(text)?)
    }

    /// Parse base64 text without inspecting the decoded bytes. The format is
    /// taken from the magic number when it is recognised and is PNG otherwise.
    pub fn from_base64_opaque(text: &str) -> LocatorResult<Self> {
        let bytes = decode_base64_payload(text)?;
        let format = image::guess_format(&bytes).unwrap_or(ImageFormat::Png);
        Ok(Self {
            bytes: Arc::from(bytes),
            format,
        })
    }

    /// Encode a raster as PNG.
    pub fn encode_png(img: &DynamicImage) -> LocatorResult<Self> {
        let mut png_bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(|e| LocatorError::Encode(format!("PNG encode: {e}")))?;
        Ok(Self {
            bytes: Arc::from(png_bytes),
            format: ImageFormat::Png,
        })
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.to_mime_type(), self.to_base64())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn is_png(&self) -> bool {
        self.format == ImageFormat::Png
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn decode(&self) -> LocatorResult<DynamicImage> {
        image::load_from_memory_with_format(&self.bytes, self.format)
            .map_err(|e| LocatorError::Decode(e.to_string()))
    }

    /// Pixel size of the encoded image. Decodes the payload.
    pub fn dimensions(&self) -> LocatorResult<(u32, u32)> {
        Ok(self.decode()?.dimensions())
    }
}

fn decode_base64_payload(text: &str) -> LocatorResult<Vec<u8>> {
    let payload = match text.split_once(',') {
        Some((head, rest)) if head.starts_with("data:") => rest,
        _ => text,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(cleaned)?)
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Serialize for EncodedImage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for EncodedImage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        EncodedImage::from_base64_opaque(&text).map_err(serde::de::Error::custom)
    }
}
