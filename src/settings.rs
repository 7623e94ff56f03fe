use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub download_url: String,
    pub upload_url: String,
    pub ping_urls: Vec<String>,
    /// Endpoint probed by the jitter test. Falls back to the first ping URL.
    pub jitter_url: Option<String>,
    pub jitter_probes: usize,
    pub upload_size_bytes: usize,
    pub chunk_size: usize,
    pub sample_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_url: "https://speed.cloudflare.com/__down?bytes=25000000".to_string(),
            upload_url: "https://speed.cloudflare.com/__up".to_string(),
            ping_urls: vec![
                "https://1.1.1.1".to_string(),
                "https://www.google.com".to_string(),
            ],
            jitter_url: None,
            jitter_probes: 5,
            upload_size_bytes: 5 * 1024 * 1024,
            chunk_size: 8192,
            sample_interval_ms: 200,
            connect_timeout_secs: 30,
            request_timeout_secs: 120,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_urls.is_empty() {
            return Err(ConfigError::Invalid("ping_urls must not be empty".into()));
        }
        if self.download_url.is_empty() || self.upload_url.is_empty() {
            return Err(ConfigError::Invalid(
                "download_url and upload_url must be set".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        if self.jitter_probes == 0 {
            return Err(ConfigError::Invalid("jitter_probes must be positive".into()));
        }
        if self.upload_size_bytes == 0 {
            return Err(ConfigError::Invalid(
                "upload_size_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn jitter_url(&self) -> &str {
        self.jitter_url
            .as_deref()
            .or_else(|| self.ping_urls.first().map(String::as_str))
            .unwrap_or_default()
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
