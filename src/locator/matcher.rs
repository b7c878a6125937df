use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::types::CompareResponse;
use crate::driver::{Driver, MatchOptions, MatchRect, MATCH_TEMPLATE_MODE};
use crate::imaging::EncodedImage;

/// Outcome of a template search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchResult {
    NotFound,
    Found {
        /// Annotated screenshot; only present when it was requested and the
        /// backend produced one.
        visualization: Option<EncodedImage>,
        score: Option<f64>,
        rect: Option<MatchRect>,
    },
}

impl MatchResult {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn visualization(&self) -> Option<&EncodedImage> {
        match self {
            Self::Found { visualization, .. } => visualization.as_ref(),
            Self::NotFound => None,
        }
    }
}

/// Template-matching backend.
///
/// Infallible by contract: a backend failure is reported as
/// [`MatchResult::NotFound`], so callers cannot tell it apart from a genuine
/// miss.
#[async_trait]
pub trait MatchInvoker: Send + Sync {
    async fn match_images(
        &self,
        screenshot: &EncodedImage,
        candidate: &EncodedImage,
        options: &MatchOptions,
    ) -> MatchResult;
}

/// Matching through the automation session's compare-images command.
pub struct DriverMatcher {
    driver: Arc<dyn Driver>,
    mode: String,
}

impl DriverMatcher {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_mode(driver, MATCH_TEMPLATE_MODE.to_string())
    }

    pub fn with_mode(driver: Arc<dyn Driver>, mode: String) -> Self {
        Self { driver, mode }
    }
}

#[async_trait]
impl MatchInvoker for DriverMatcher {
    async fn match_images(
        &self,
        screenshot: &EncodedImage,
        candidate: &EncodedImage,
        options: &MatchOptions,
    ) -> MatchResult {
        let first = screenshot.to_base64();
        let second = candidate.to_base64();
        match self
            .driver
            .compare_images(&self.mode, &first, &second, options)
            .await
        {
            Ok(value) => interpret_response(&value, options),
            Err(e) => {
                tracing::warn!(error = %e, mode = %self.mode, "image match failed; reporting not found");
                MatchResult::NotFound
            }
        }
    }
}

/// JavaScript-style truthiness; empty containers also count as "nothing".
fn is_empty_response(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Turn a raw compare response into a [`MatchResult`].
pub fn interpret_response(value: &Value, options: &MatchOptions) -> MatchResult {
    if is_empty_response(value) {
        tracing::info!("backend reported no match");
        return MatchResult::NotFound;
    }

    let response = CompareResponse::from_value(value);
    let visualization = if options.visualize {
        response
            .visualization
            .as_deref()
            .and_then(|b64| match EncodedImage::from_base64_opaque(b64) {
                Ok(img) => Some(img),
                Err(e) => {
                    tracing::warn!(error = %e, "visualization is not base64; dropping it");
                    None
                }
            })
    } else {
        None
    };

    tracing::info!(
        score = ?response.score,
        rect = ?response.rect,
        visualization = visualization.is_some(),
        "template found"
    );
    MatchResult::Found {
        visualization,
        score: response.score,
        rect: response.rect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{LocatorError, LocatorResult};
    use crate::imaging::codec::tests::png;
    use serde_json::json;
    use std::sync::Mutex;

    struct CompareDriver {
        response: Result<Value, String>,
        seen: Mutex<Vec<(String, MatchOptions)>>,
    }

    impl CompareDriver {
        fn new(response: Result<Value, String>) -> Arc<Self> {
            Arc::new(Self {
                response,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Driver for CompareDriver {
        async fn take_screenshot(&self) -> LocatorResult<String> {
            Err(LocatorError::Driver("unused".into()))
        }

        async fn compare_images(
            &self,
            mode: &str,
            _first: &str,
            _second: &str,
            options: &MatchOptions,
        ) -> LocatorResult<Value> {
            self.seen.lock().unwrap().push((mode.to_string(), *options));
            self.response.clone().map_err(LocatorError::Driver)
        }
    }

    fn visualize_opts() -> MatchOptions {
        MatchOptions {
            threshold: 0.7,
            visualize: true,
        }
    }

    #[tokio::test]
    async fn test_visualization_is_returned_when_requested() {
        let viz = png(6, 6);
        let driver = CompareDriver::new(Ok(json!({ "visualization": viz.to_base64() })));
        let matcher = DriverMatcher::new(driver.clone());
        let result = matcher
            .match_images(&png(20, 20), &png(5, 5), &visualize_opts())
            .await;
        assert_eq!(
            result,
            MatchResult::Found {
                visualization: Some(viz),
                score: None,
                rect: None
            }
        );
        let seen = driver.seen.lock().unwrap();
        assert_eq!(seen[0].0, "matchTemplate");
        assert_eq!(seen[0].1, visualize_opts());
    }

    #[tokio::test]
    async fn test_backend_error_is_not_found() {
        let matcher = DriverMatcher::new(CompareDriver::new(Err("socket hang up".into())));
        let result = matcher
            .match_images(&png(20, 20), &png(5, 5), &visualize_opts())
            .await;
        assert_eq!(result, MatchResult::NotFound);
    }

    #[test]
    fn test_falsy_values_are_not_found() {
        for value in [json!(null), json!(false), json!(0), json!(""), json!({}), json!([])] {
            assert_eq!(interpret_response(&value, &visualize_opts()), MatchResult::NotFound, "{value}");
        }
    }

    #[test]
    fn test_visualization_dropped_when_not_requested() {
        let value = json!({ "visualization": png(2, 2).to_base64(), "score": 0.93 });
        let opts = MatchOptions {
            threshold: 0.7,
            visualize: false,
        };
        let result = interpret_response(&value, &opts);
        assert_eq!(
            result,
            MatchResult::Found {
                visualization: None,
                score: Some(0.93),
                rect: None
            }
        );
    }

    #[test]
    fn test_score_and_rect_are_carried() {
        let value = json!({
            "score": 0.88,
            "rect": {"x": 10, "y": 20, "width": 30, "height": 40}
        });
        let result = interpret_response(&value, &visualize_opts());
        assert!(result.is_found());
        assert!(result.visualization().is_none());
        match result {
            MatchResult::Found { score, rect, .. } => {
                assert_eq!(score, Some(0.88));
                assert_eq!(rect, Some(MatchRect { x: 10, y: 20, width: 30, height: 40 }));
            }
            MatchResult::NotFound => panic!("expected found"),
        }
    }

    #[test]
    fn test_truthy_scalar_is_found_without_details() {
        let result = interpret_response(&json!(true), &visualize_opts());
        assert_eq!(
            result,
            MatchResult::Found {
                visualization: None,
                score: None,
                rect: None
            }
        );
    }

    #[test]
    fn test_unrecognised_visualization_is_kept() {
        let payload = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b"opaque-visualization-bytes",
        );
        let result = interpret_response(&json!({ "visualization": payload }), &visualize_opts());
        assert!(result.is_found());
        let viz = result.visualization().unwrap();
        assert_eq!(viz.bytes(), b"opaque-visualization-bytes");
        assert_eq!(viz.to_base64(), payload);
    }

    #[test]
    fn test_non_base64_visualization_still_counts_as_found() {
        let result = interpret_response(&json!({ "visualization": "@@@" }), &visualize_opts());
        assert!(result.is_found());
        assert!(result.visualization().is_none());
    }
}
