use std::path::{Path, PathBuf};

use crate::error::{CopydeskError, Result};

const DEFAULT_AUTHOR_ROLE: &str = "author";
const DEFAULT_AUTHOR_EMAIL_DOMAIN: &str = "example.invalid";

/// Application configuration loaded from environment variables (and a `.env`
/// file when present). Everything here is needed before the first row is read.
#[derive(Debug, Clone)]
pub struct Config {
    /// Google service-account key file.
    pub google_credentials_file: PathBuf,

    /// WordPress REST base, e.g. `https://example.com/wp-json`.
    pub wp_url: String,
    pub wp_user: String,
    /// Application password, not the login password.
    pub wp_password: String,

    /// Role given to authors created on demand.
    pub author_role: String,
    /// Domain used to build placeholder emails for created authors.
    pub author_email_domain: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. All missing required keys are
    /// reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut missing = Vec::new();
        let mut require = |key: &'static str| {
            let value = get(key);
            if value.is_none() {
                missing.push(key);
            }
            value.unwrap_or_default()
        };

        let credentials = require("GOOGLE_CREDENTIALS_FILE");
        let wp_url = require("WP_URL");
        let wp_user = require("WP_USER");
        let wp_password = require("WP_PASSWORD");

        if !missing.is_empty() {
            return Err(CopydeskError::Configuration(format!(
                "missing required environment variable(s): {}",
                missing.join(", ")
            )));
        }

        let config = Self {
            google_credentials_file: expand_home(&credentials),
            wp_url: wp_url.trim_end_matches('/').to_string(),
            wp_user,
            wp_password,
            author_role: get("WP_AUTHOR_ROLE").unwrap_or_else(|| DEFAULT_AUTHOR_ROLE.to_string()),
            author_email_domain: get("WP_AUTHOR_EMAIL_DOMAIN")
                .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL_DOMAIN.to_string()),
        };

        if !config.google_credentials_file.is_file() {
            return Err(CopydeskError::Configuration(format!(
                "GOOGLE_CREDENTIALS_FILE does not point at a file: {}",
                config.google_credentials_file.display()
            )));
        }

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.chars().take(4).map(char::len_utf8).sum::<usize>();
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  GOOGLE_CREDENTIALS_FILE: {}", self.google_credentials_file.display());
        tracing::info!("  WP_URL: {}", self.wp_url);
        tracing::info!("  WP_USER: {}", self.wp_user);
        tracing::info!("  WP_PASSWORD: {}", preview(&self.wp_password));
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| Path::new(raw).to_path_buf()),
        None => PathBuf::from(raw),
    }
}
