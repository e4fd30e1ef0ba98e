// Client configuration
//
// Read from <config_dir>/dashchat/config.json when present, otherwise defaults.
// DASHCHAT_GRAPHQL_URL and DASHCHAT_REST_URL override the endpoints.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chat::pagination::AutoSizer;

pub const APP_DIR: &str = "dashchat";
pub const GRAPHQL_URL_VAR: &str = "DASHCHAT_GRAPHQL_URL";
pub const REST_URL_VAR: &str = "DASHCHAT_REST_URL";

/// Pixel heights used to size the contact list page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub chrome_height: u32,
    pub row_height: u32,
    pub row_spacing: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let sizer = AutoSizer::default();
        LayoutConfig {
            chrome_height: sizer.chrome_height,
            row_height: sizer.row_height,
            row_spacing: sizer.row_spacing,
        }
    }
}

impl LayoutConfig {
    pub fn auto_sizer(&self) -> AutoSizer {
        AutoSizer::new()
            .with_chrome_height(self.chrome_height)
            .with_row_height(self.row_height)
            .with_row_spacing(self.row_spacing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub graphql_url: String,
    pub rest_base_url: String,
    pub request_timeout_secs: u64,
    pub typing_timeout_secs: i64,
    pub layout: LayoutConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            graphql_url: "http://localhost:8000/graphql/".to_string(),
            rest_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 15,
            typing_timeout_secs: 6,
            layout: LayoutConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn typing_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.typing_timeout_secs)
    }

    /// Load from `path`, or from the default location when `path` is None.
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let mut config = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: ClientConfig = serde_json::from_str(&contents)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            config
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            ClientConfig::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply endpoint overrides from a variable lookup (the environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(GRAPHQL_URL_VAR).filter(|v| !v.trim().is_empty()) {
            debug!("GraphQL endpoint overridden to {}", url);
            self.graphql_url = url;
        }
        if let Some(url) = lookup(REST_URL_VAR).filter(|v| !v.trim().is_empty()) {
            debug!("REST base URL overridden to {}", url);
            self.rest_base_url = url;
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// `<config_dir>/dashchat`, created on demand
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join(APP_DIR);

    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = ClientConfig::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"request_timeout_secs": 3, "layout": {"row_height": 50}}"#).unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.layout.row_height, 50);
        assert_eq!(config.layout.chrome_height, LayoutConfig::default().chrome_height);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(ClientConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = ClientConfig::default();
        config.apply_overrides(|name| match name {
            GRAPHQL_URL_VAR => Some("https://dash.example.com/graphql/".to_string()),
            REST_URL_VAR => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.graphql_url, "https://dash.example.com/graphql/");
        assert_eq!(config.rest_base_url, ClientConfig::default().rest_base_url);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = ClientConfig::default();
        config.typing_timeout_secs = 10;
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.typing_timeout(), chrono::Duration::seconds(10));
    }
}
