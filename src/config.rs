//! Process configuration read from the environment.

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::search::config::BRAVE_API_URL;

/// Default proxy server port.
pub const DEFAULT_PORT: u16 = 3333;

/// Default database file.
pub const DEFAULT_DB_PATH: &str = "llama_tamer.db";

/// Default static files directory.
pub const DEFAULT_STATIC_DIR: &str = "public";

const PORT_VAR: &str = "LLAMATAMER_PORT";
const DB_VAR: &str = "LLAMATAMER_DB";
const STATIC_DIR_VAR: &str = "LLAMATAMER_STATIC_DIR";
const BRAVE_URL_VAR: &str = "LLAMATAMER_BRAVE_URL";
const SEARCH_PROXY_VAR: &str = "LLAMATAMER_SEARCH_PROXY";

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Process configuration shared by both binaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Port of the search proxy server.
    pub port: u16,
    /// `SQLite` file holding settings and conversations.
    pub db_path: PathBuf,
    /// Directory served as static files.
    pub static_dir: PathBuf,
    /// Web search endpoint.
    pub brave_api_url: String,
    /// Base URL of a running search proxy. When set, the chat client
    /// searches through it instead of calling the provider itself.
    pub search_proxy_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            brave_api_url: BRAVE_API_URL.to_string(),
            search_proxy_url: None,
        }
    }
}

impl AppConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Unset or blank variables keep their defaults.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = get(PORT_VAR) {
            config.port = port.trim().parse().map_err(|e| ConfigError::Invalid {
                name: PORT_VAR,
                reason: format!("{e}"),
            })?;
        }
        if let Some(path) = get(DB_VAR) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(dir) = get(STATIC_DIR_VAR) {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(url) = get(BRAVE_URL_VAR) {
            config.brave_api_url = url.trim().to_string();
        }
        if let Some(url) = get(SEARCH_PROXY_VAR) {
            config.search_proxy_url = Some(url.trim().trim_end_matches('/').to_string());
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the values that can be checked without I/O.
    ///
    /// # Errors
    /// Returns an error if the search endpoint or the proxy URL is not an
    /// HTTP(S) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_http_url(BRAVE_URL_VAR, &self.brave_api_url)?;
        if let Some(proxy) = &self.search_proxy_url {
            check_http_url(SEARCH_PROXY_VAR, proxy)?;
        }
        Ok(())
    }
}

fn check_http_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap_or_default();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 3333);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LLAMATAMER_PORT", " 8080 "),
            ("LLAMATAMER_DB", "/tmp/chat.db"),
            ("LLAMATAMER_STATIC_DIR", "  "),
            ("LLAMATAMER_BRAVE_URL", "http://127.0.0.1:9000/search"),
            ("LLAMATAMER_SEARCH_PROXY", "http://localhost:3333/"),
        ]))
        .unwrap_or_default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/chat.db"));
        assert_eq!(config.static_dir, PathBuf::from(DEFAULT_STATIC_DIR));
        assert_eq!(config.brave_api_url, "http://127.0.0.1:9000/search");
        assert_eq!(config.search_proxy_url.as_deref(), Some("http://localhost:3333"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[("LLAMATAMER_PORT", "http")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LLAMATAMER_BRAVE_URL", "ftp://x")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LLAMATAMER_BRAVE_URL", "nope")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LLAMATAMER_SEARCH_PROXY", "localhost")])).is_err());
    }
}
