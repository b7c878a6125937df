use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::driver::types::{MatchOptions, DEFAULT_THRESHOLD, MATCH_TEMPLATE_MODE};
use crate::errors::{LocatorError, LocatorResult};

const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "imgloc";

pub const ENV_SERVER_URL: &str = "IMGLOC_SERVER_URL";
pub const ENV_SESSION_ID: &str = "IMGLOC_SESSION_ID";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Id of an already-running automation session.
    #[serde(default)]
    pub session_id: String,
    /// Backend identifier (`uiautomator2`, `xcuitest`, ...). Decides which
    /// extra locator strategies are offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_name: Option<String>,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            session_id: String::new(),
            automation_name: None,
            request_timeout_secs: default_timeout(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:4723".to_string()
}

fn default_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_true")]
    pub visualize: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            threshold: default_threshold(),
            visualize: true,
        }
    }
}

impl MatchingConfig {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            threshold: self.threshold,
            visualize: self.visualize,
        }
    }
}

fn default_mode() -> String {
    MATCH_TEMPLATE_MODE.to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn validate(&self) -> LocatorResult<()> {
        if !(0.0..=1.0).contains(&self.matching.threshold) {
            return Err(LocatorError::Config(format!(
                "matching.threshold must be within [0, 1], got {}",
                self.matching.threshold
            )));
        }
        if self.matching.mode.trim().is_empty() {
            return Err(LocatorError::Config("matching.mode is empty".into()));
        }
        if self.driver.request_timeout_secs == 0 {
            return Err(LocatorError::Config(
                "driver.request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Apply `IMGLOC_*` overrides. `lookup` is normally `std::env::var`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(url = %url, "server url overridden from environment");
            self.driver.server_url = url;
        }
        if let Some(id) = lookup(ENV_SESSION_ID).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("session id overridden from environment");
            self.driver.session_id = id;
        }
    }
}

/// `config.toml` in the per-user config directory, e.g.
/// `~/.config/imgloc/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn resolve_config_path(explicit: Option<&Path>) -> LocatorResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(LocatorError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    if let Some(candidate) = user_config_path() {
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

pub fn read_config_file(path: &Path) -> LocatorResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load the config from the first location found, fall back to defaults,
/// apply environment overrides and validate.
pub fn load_config(explicit: Option<&Path>) -> LocatorResult<AppConfig> {
    let mut config = match resolve_config_path(explicit)? {
        Some(path) => {
            let cfg = read_config_file(&path)?;
            tracing::info!(path = %path.display(), server = %cfg.driver.server_url, "config loaded");
            cfg
        }
        None => {
            tracing::info!("no config.toml found; using defaults");
            AppConfig::default()
        }
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> LocatorResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
