//! Runtime configuration.
//!
//! Everything is read from the environment (the binary loads a `.env` file
//! first). The remote table is optional: it is configured only when both its
//! URL and key are present.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::remote::DEFAULT_TABLE;

/// Default base URL of the chat/quiz backend.
pub const DEFAULT_CHAT_URL: &str = "https://smart-study-partner.onrender.com";

/// Connection settings for the remote notes table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `notes.db`.
    pub data_dir: PathBuf,
    /// Base URL of the chat backend.
    pub chat_url: String,
    /// Remote table settings, if configured.
    pub remote: Option<RemoteConfig>,
}

impl Config {
    /// Reads configuration from environment variables.
    ///
    /// | Variable           | Default                              |
    /// |--------------------|--------------------------------------|
    /// | `SSP_DATA_DIR`     | `{data_dir}/ssp`                     |
    /// | `SSP_CHAT_URL`     | [`DEFAULT_CHAT_URL`]                 |
    /// | `SSP_REMOTE_URL`   | unset (remote disabled)              |
    /// | `SSP_REMOTE_KEY`   | unset (remote disabled)              |
    /// | `SSP_REMOTE_TABLE` | [`DEFAULT_TABLE`]                    |
    ///
    /// `data_dir` is `~/.local/share` on Linux, `~/Library/Application Support`
    /// on macOS and `%APPDATA%` on Windows.
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory is set and none can be determined.
    pub fn from_env() -> Result<Self> {
        let data_dir = match env_nonempty("SSP_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?
                .join("ssp"),
        };

        let chat_url = env_nonempty("SSP_CHAT_URL").unwrap_or_else(|| DEFAULT_CHAT_URL.to_string());

        let remote = match (env_nonempty("SSP_REMOTE_URL"), env_nonempty("SSP_REMOTE_KEY")) {
            (Some(url), Some(api_key)) => Some(RemoteConfig {
                url,
                api_key,
                table: env_nonempty("SSP_REMOTE_TABLE")
                    .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "SSP_REMOTE_URL and SSP_REMOTE_KEY must both be set; remote table disabled"
                );
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            data_dir,
            chat_url,
            remote,
        })
    }

    /// Path of the local database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("notes.db")
    }
}

/// Ensures the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_parent_directory(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
