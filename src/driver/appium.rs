use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::DriverConfig;
use crate::driver::traits::Driver;
use crate::driver::types::{CompareImagesRequest, MatchOptions, W3cError};
use crate::errors::{LocatorError, LocatorResult};

/// HTTP client for an existing Appium (W3C WebDriver) session.
pub struct AppiumDriver {
    server_url: String,
    session_id: String,
    client: reqwest::Client,
}

impl AppiumDriver {
    pub fn new(server_url: String, session_id: String, timeout: Duration) -> LocatorResult<Self> {
        if session_id.trim().is_empty() {
            return Err(LocatorError::Config("driver session_id is empty".into()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            session_id,
            client,
        })
    }

    pub fn from_config(cfg: &DriverConfig) -> LocatorResult<Self> {
        Self::new(
            cfg.server_url.clone(),
            cfg.session_id.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    fn endpoint(&self, command: &str) -> String {
        format!("{}/session/{}/{}", self.server_url, self.session_id, command)
    }

    async fn read_value(&self, response: reqwest::Response) -> LocatorResult<Value> {
        let status = response.status();
        let body = response.text().await?;
        unwrap_w3c_value(status.is_success(), status.as_u16(), &body)
    }
}

/// Pull `value` out of a W3C response envelope, turning error payloads into
/// [`LocatorError::Driver`].
pub(crate) fn unwrap_w3c_value(success: bool, status: u16, body: &str) -> LocatorResult<Value> {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) if success => return Err(e.into()),
        Err(_) => {
            return Err(LocatorError::Driver(format!("HTTP {status}: {}", body.trim())));
        }
    };

    let value = parsed.get("value").cloned().unwrap_or(Value::Null);
    if let Ok(err) = serde_json::from_value::<W3cError>(value.clone()) {
        return Err(LocatorError::Driver(format!("{}: {}", err.error, err.message)));
    }
    if !success {
        return Err(LocatorError::Driver(format!("HTTP {status}: {}", body.trim())));
    }
    Ok(value)
}

#[async_trait]
impl Driver for AppiumDriver {
    async fn take_screenshot(&self) -> LocatorResult<String> {
        let url = self.endpoint("screenshot");
        tracing::debug!(url = %url, "requesting screenshot");
        let response = self.client.get(&url).send().await?;
        let value = self.read_value(response).await?;
        match value {
            Value::String(b64) => {
                tracing::debug!(chars = b64.len(), "screenshot received");
                Ok(b64)
            }
            other => Err(LocatorError::Driver(format!(
                "screenshot value is not a string: {}",
                type_name(&other)
            ))),
        }
    }

    async fn compare_images(
        &self,
        mode: &str,
        first_image: &str,
        second_image: &str,
        options: &MatchOptions,
    ) -> LocatorResult<Value> {
        let url = self.endpoint("appium/compare_images");
        let body = CompareImagesRequest {
            mode,
            first_image,
            second_image,
            options,
        };
        tracing::debug!(
            url = %url,
            mode,
            threshold = options.threshold,
            visualize = options.visualize,
            first_len = first_image.len(),
            second_len = second_image.len(),
            "sending compare_images (base64 omitted)"
        );
        let response = self.client.post(&url).json(&body).send().await?;
        self.read_value(response).await
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
