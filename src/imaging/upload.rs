use std::path::Path;

use image::ImageFormat;

use crate::errors::{LocatorError, LocatorResult};
use crate::imaging::codec::EncodedImage;

/// A user-supplied file offered as a template candidate.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// Declared media type, e.g. `image/png`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring its media type from the extension.
    /// Unknown extensions are declared as `application/octet-stream`.
    pub async fn from_path(path: &Path) -> LocatorResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let media_type = ImageFormat::from_path(path)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, media_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Reject anything whose declared media type is not `image/*`.
///
/// Runs before any decoding so a bad upload never touches workflow state.
pub fn validate_upload(file: &UploadedFile) -> LocatorResult<()> {
    if file.is_image() {
        Ok(())
    } else {
        tracing::warn!(name = %file.name, media_type = %file.media_type, "upload rejected");
        Err(LocatorError::UnsupportedFileType {
            media_type: file.media_type.clone(),
        })
    }
}

/// Validate and decode an upload into a PNG [`EncodedImage`].
///
/// PNG uploads are kept byte-for-byte once they are known to decode; other
/// formats are re-encoded so every candidate crosses the boundary as PNG.
pub async fn decode_upload(file: UploadedFile) -> LocatorResult<EncodedImage> {
    validate_upload(&file)?;
    let name = file.name.clone();

    let encoded = tokio::task::spawn_blocking(move || -> LocatorResult<EncodedImage> {
        let source = EncodedImage::from_bytes(file.bytes)?;
        let raster = source.decode()?;
        if source.is_png() {
            Ok(source)
        } else {
            EncodedImage::encode_png(&raster)
        }
    })
    .await
    .map_err(|e| LocatorError::Decode(format!("join: {e}")))??;

    tracing::info!(name = %name, bytes = encoded.len(), "upload decoded");
    Ok(encoded)
}
