use async_trait::async_trait;

use crate::driver::types::MatchOptions;
use crate::errors::LocatorResult;

/// Capabilities of an automation session that the image locator needs.
///
/// Images cross this boundary as base64 PNG text.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Base64 PNG of the current device screen.
    async fn take_screenshot(&self) -> LocatorResult<String>;

    /// Raw `value` of the compare command. Falsy or empty values mean "no
    /// match"; interpretation is left to the caller.
    async fn compare_images(
        &self,
        mode: &str,
        first_image: &str,
        second_image: &str,
        options: &MatchOptions,
    ) -> LocatorResult<serde_json::Value>;
}
