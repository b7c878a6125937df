use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Screenshot capture failed: {0}")]
    CaptureFailed(String),

    #[error("Image has not been measured yet (displayed size is {width}x{height})")]
    UnmeasuredImage { width: u32, height: u32 },

    #[error("Crop region ({x},{y} {width}x{height}) exceeds image bounds ({image_width}x{image_height})")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Selection is empty after scaling to the natural image")]
    EmptySelection,

    #[error("You can only upload image files (got '{media_type}')")]
    UnsupportedFileType { media_type: String },

    #[error("Image matching failed: {0}")]
    MatchFailed(String),

    #[error("No screenshot is loaded")]
    NoScreenshot,

    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: &'static str },

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Image encode error: {0}")]
    Encode(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl serde::Serialize for LocatorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type LocatorResult<T> = Result<T, LocatorError>;
