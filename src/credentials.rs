use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{info, warn};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::PathBuf;

use crate::config;

pub const TOKEN_VAR: &str = "DASHCHAT_TOKEN";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub user_id: i64,
    /// Base64 of the API token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Credentials {
    pub fn new(username: &str, user_id: i64, token: &str) -> Self {
        Credentials {
            username: username.to_string(),
            user_id,
            token: Some(BASE64.encode(token)),
        }
    }

    pub fn get_token(&self) -> Option<String> {
        let encoded = self.token.as_ref()?;
        match BASE64.decode(encoded).map(String::from_utf8) {
            Ok(Ok(token)) => Some(token),
            _ => {
                warn!("Stored token for {} is not valid base64 text", self.username);
                None
            }
        }
    }
}

static CREDENTIALS_PATH_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Store credentials somewhere else, e.g. a temp dir in tests. Only the first call wins.
pub fn set_credentials_path_override(path: PathBuf) -> Result<()> {
    CREDENTIALS_PATH_OVERRIDE
        .set(path)
        .map_err(|p| anyhow!("Credentials path already overridden, ignoring {}", p.display()))
}

fn get_credentials_path() -> Result<PathBuf> {
    if let Some(path) = CREDENTIALS_PATH_OVERRIDE.get() {
        return Ok(path.clone());
    }
    Ok(config::config_dir()?.join("credentials.json"))
}

pub fn save_credentials(credentials: &Credentials) -> Result<()> {
    let path = get_credentials_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    serde_json::to_writer_pretty(file, credentials)?;

    info!("Credentials saved for {}", credentials.username);
    Ok(())
}

pub fn load_credentials() -> Result<Option<Credentials>> {
    let path = get_credentials_path()?;
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)?;
    let credentials: Credentials = serde_json::from_str(&contents)?;
    info!("Loaded credentials for {} from {}", credentials.username, path.display());

    Ok(Some(credentials))
}

/// Token to authenticate with: the environment wins over the stored credentials
pub fn resolve_token() -> Result<Option<String>> {
    if let Ok(token) = std::env::var(TOKEN_VAR) {
        if !token.trim().is_empty() {
            return Ok(Some(token));
        }
    }
    Ok(load_credentials()?.and_then(|c| c.get_token()))
}
