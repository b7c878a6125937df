use serde::{Deserialize, Serialize};

/// Comparison mode used for template matching.
pub const MATCH_TEMPLATE_MODE: &str = "matchTemplate";

pub const DEFAULT_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Minimum similarity in `[0, 1]` for a match to count.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Ask the backend for an annotated image of the match.
    #[serde(default = "default_true")]
    pub visualize: bool,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_true() -> bool {
    true
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            visualize: true,
        }
    }
}

/// Body of `POST /session/{id}/appium/compare_images`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareImagesRequest<'a> {
    pub mode: &'a str,
    pub first_image: &'a str,
    pub second_image: &'a str,
    pub options: &'a MatchOptions,
}

/// Location of a template match in the full screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Interesting fields of a non-empty compare response. Every field is optional;
/// backends differ in what they report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompareResponse {
    pub visualization: Option<String>,
    pub score: Option<f64>,
    pub rect: Option<MatchRect>,
}

impl CompareResponse {
    /// Read the known fields one by one so a malformed field does not hide
    /// the others.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            visualization: value
                .get("visualization")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            score: value.get("score").and_then(|v| v.as_f64()),
            rect: value
                .get("rect")
                .and_then(|r| serde_json::from_value(r.clone()).ok()),
        }
    }
}

/// W3C error payload found under `value` on failed commands.
#[derive(Debug, Clone, Deserialize)]
pub struct W3cError {
    pub error: String,
    #[serde(default)]
    pub message: String,
}
