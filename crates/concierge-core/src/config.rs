use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state::View;
use crate::wire::MessageShape;

pub const ENV_BASE_URL: &str = "CONCIERGE_BASE_URL";
pub const ENV_PAGE_URL: &str = "CONCIERGE_PAGE_URL";
pub const ENV_POLL_MS: &str = "CONCIERGE_POLL_MS";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Chat backend root, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Page identifier sent with the intro and AI turns
    pub page_url: String,
    pub poll_interval_ms: u64,
    pub message_shape: MessageShape,
    pub view: View,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            page_url: "http://localhost:3000/".to_string(),
            poll_interval_ms: 1000,
            message_shape: MessageShape::RoleContent,
            view: View::Customer,
            log_dir: None,
        }
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply `CONCIERGE_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(page_url) = lookup(ENV_PAGE_URL) {
            self.page_url = page_url;
        }
        if let Some(poll_ms) = lookup(ENV_POLL_MS) {
            self.poll_interval_ms = poll_ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", ENV_POLL_MS))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll interval must be greater than zero");
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            bail!("base url must start with http:// or https://, got {}", self.base_url);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("concierge").join("config.json"))
    }

    /// Configured log directory, or the platform data directory
    pub fn resolved_log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|p| p.join("concierge").join("logs")))
    }
}
