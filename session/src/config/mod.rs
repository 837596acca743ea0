//! Central module for session manager configuration.
//!
//! Settings are read from the environment (and a `.env` file when present):
//! backend location, login entry point, credential store path, accepted roles
//! and network timeouts.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CREDENTIAL_STORE_PATH: &str = "~/.portal-session/credentials.json";

// Falls back to the literal path only when the home directory is unknown.
fn default_credential_store_path() -> PathBuf {
    expanduser::expanduser(DEFAULT_CREDENTIAL_STORE_PATH)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CREDENTIAL_STORE_PATH))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub api_version: String,
    pub login_path: String,
    pub credential_store_path: PathBuf,
    pub portal_roles: String,
    pub refresh_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: "http://localhost:8000".to_string(),
            api_version: "/api/v1".to_string(),
            login_path: "/login".to_string(),
            credential_store_path: default_credential_store_path(),
            portal_roles: "any".to_string(),
            refresh_timeout_seconds: 15,
            request_timeout_seconds: 30,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let api_base_url = env::var("API_BASE_URL").unwrap_or(defaults.api_base_url);
        let api_version = env::var("API_VERSION").unwrap_or(defaults.api_version);
        let login_path = env::var("LOGIN_PATH").unwrap_or(defaults.login_path);

        let credential_store_path = match env::var("CREDENTIAL_STORE_PATH") {
            Ok(path) => expanduser::expanduser(&path)
                .context("CREDENTIAL_STORE_PATH could not be expanded")?,
            Err(_) => expanduser::expanduser(DEFAULT_CREDENTIAL_STORE_PATH)
                .context("default credential store path could not be expanded")?,
        };

        let portal_roles = env::var("PORTAL_ROLES").unwrap_or(defaults.portal_roles);

        let refresh_timeout_seconds = env::var("REFRESH_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "15".to_string())
            .parse::<u64>()
            .context("REFRESH_TIMEOUT_SECONDS must be a valid number")?;

        let request_timeout_seconds = env::var("REQUEST_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("REQUEST_TIMEOUT_SECONDS must be a valid number")?;

        Ok(Config {
            api_base_url,
            api_version,
            login_path,
            credential_store_path,
            portal_roles,
            refresh_timeout_seconds,
            request_timeout_seconds,
        })
    }

    /// Base URL every API path is joined onto, e.g. `http://localhost:8000/api/v1`.
    pub fn api_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
