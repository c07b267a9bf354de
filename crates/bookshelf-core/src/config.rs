//! Application configuration management.
//!
//! The config file holds the API base URL, the list page size, and the
//! last email used to log in. It is stored at
//! `~/.config/bookshelf/config.json`. The `BOOKSHELF_API_URL` environment
//! variable overrides the stored base URL at load time.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "bookshelf";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
const API_URL_ENV: &str = "BOOKSHELF_API_URL";

/// Default API base URL for local development
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default number of books requested per page
const DEFAULT_PAGE_SIZE: u32 = 10;

// Endpoint paths, kept verbatim for compatibility with the remote API.
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const BOOKS_PATH: &str = "/api/books";
pub const GENRES_PATH: &str = "/api/books/genres/list";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub page_size: u32,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                config.base_url = url;
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Full URL for an endpoint path, with no double slashes.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_localhost() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.page_size, 10);
        assert!(config.last_email.is_none());
    }

    #[test]
    fn api_url_strips_trailing_slash() {
        let config = Config {
            base_url: "http://localhost:3000/".to_string(),
            ..Config::default()
        };
        assert_eq!(config.api_url(BOOKS_PATH), "http://localhost:3000/api/books");
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = Config {
            base_url: "https://books.example.com".to_string(),
            page_size: 25,
            last_email: Some("reader@example.com".to_string()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base_url, config.base_url);
        assert_eq!(back.page_size, 25);
        assert_eq!(back.last_email.as_deref(), Some("reader@example.com"));
    }
}
