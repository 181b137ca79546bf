//! Runtime configuration for markwatch
//!
//! Settings are resolved in layers: built-in defaults, then an optional JSON
//! file (`config.json` in the XDG config directory), then environment
//! variables, then command-line flags.

use directories::ProjectDirs;
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// API root used when nothing else is configured
pub const DEFAULT_API_URL: &str = "https://api.change-observer.com";

/// Environment variable overriding the API root
pub const API_URL_ENV: &str = "MARKWATCH_API_URL";

/// Environment variable holding the static maps API key
pub const MAPS_API_KEY_ENV: &str = "MARKWATCH_MAPS_API_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Errors that can occur while resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid API URL '{0}': expected an http or https URL")]
    InvalidUrl(String),
}

/// Resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the marker API, without trailing slash
    pub api_url: String,
    /// Key for static map thumbnails, if configured
    pub maps_api_key: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// On-disk overrides; every field is optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    api_url: Option<String>,
    maps_api_key: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            maps_api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Default location of the config file (`~/.config/markwatch/config.json` on Linux)
    ///
    /// Returns `None` if no home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "markwatch")?;
        Some(project_dirs.config_dir().join("config.json"))
    }

    /// Resolves configuration from the given file (or the default location)
    /// and the process environment
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Defaults overlaid with the file at `path`, if it exists
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(config),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let file: ConfigFile =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(url) = file.api_url {
            config.api_url = normalize_api_url(&url)?;
        }
        if let Some(key) = file.maps_api_key {
            config.maps_api_key = Some(key).filter(|k| !k.trim().is_empty());
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_url = normalize_api_url(&url)?;
        }
        if let Some(key) = lookup(MAPS_API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.maps_api_key = Some(key);
        }
        Ok(())
    }

    /// Overrides the API root, typically from `--api-url`
    pub fn with_api_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.api_url = normalize_api_url(url)?;
        Ok(self)
    }
}

/// Validates an API root and strips trailing slashes
pub fn normalize_api_url(url: &str) -> Result<String, ConfigError> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, contents).expect("Failed to write config");
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.maps_api_key.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"api_url": "http://localhost:3000/", "maps_api_key": "abc", "request_timeout_secs": 5}"#,
        );

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.maps_api_key.as_deref(), Some("abc"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{not json");

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"api_url": "http://localhost:3000"}"#);
        let mut config = Config::from_file(&path).unwrap();

        config
            .apply_env(|name| match name {
                API_URL_ENV => Some("https://staging.example.com".to_string()),
                MAPS_API_KEY_ENV => Some("env-key".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.api_url, "https://staging.example.com");
        assert_eq!(config.maps_api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(|_| Some("  ".to_string())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_with_api_url_validates() {
        let config = Config::default().with_api_url("http://127.0.0.1:8080/").unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:8080");

        assert!(matches!(
            Config::default().with_api_url("ftp://example.com"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            Config::default().with_api_url("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
