//! Configuration loading.
//!
//! Values come from `~/.config/pictura/config.toml` (if present), then from
//! environment variables, then from whatever the caller overrides.

use crate::error::{PicturaError, Result};
use crate::image::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::image::{ImageQuality, ImageSize};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the hosted endpoint.
    pub api_key: Option<String>,
    /// API root.
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: Option<String>,
    /// Email shown for the signed-in session.
    pub email: Option<String>,
    /// Default size.
    pub size: ImageSize,
    /// Default quality.
    pub quality: ImageQuality,
    /// Where downloads are written.
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("pictura").join("config.toml")
    }

    /// Loads the default config file and applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parses a config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PicturaError::Config(format!("failed to read '{}': {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            PicturaError::Config(format!("failed to parse '{}': {e}", path.display()))
        })
    }

    /// Overrides fields from environment variables read through `lookup`.
    ///
    /// Unparseable size or quality values are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("PICTURA_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("PICTURA_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(model) = non_empty("PICTURA_MODEL") {
            self.model = Some(model);
        }
        if let Some(email) = non_empty("PICTURA_EMAIL") {
            self.email = Some(email);
        }
        if let Some(dir) = non_empty("PICTURA_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(size) = non_empty("PICTURA_SIZE") {
            match size.parse() {
                Ok(size) => self.size = size,
                Err(e) => tracing::warn!("ignoring PICTURA_SIZE: {e}"),
            }
        }
        if let Some(quality) = non_empty("PICTURA_QUALITY") {
            match quality.parse() {
                Ok(quality) => self.quality = quality,
                Err(e) => tracing::warn!("ignoring PICTURA_QUALITY: {e}"),
            }
        }
    }

    /// API root, falling back to the default endpoint.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Model identifier, falling back to the default model.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Download directory, falling back to the current directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
