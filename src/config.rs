//! Configuration Management
//!
//! Provider settings (`apiToken`, `apiUrl`) are resolved once at program entry
//! and threaded through every call. Precedence, highest first:
//! explicit argument, environment variable, config file, built-in default.

use crate::error::ProviderError;
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.cast.ai";
pub const API_TOKEN_ENV: &str = "CASTAI_API_TOKEN";
pub const API_URL_ENV: &str = "CASTAI_API_URL";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Persistent configuration stored on disk
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("castai").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`; missing or unreadable files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config file {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Values passed explicitly (CLI flags or program arguments)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_token: Option<String>,
    pub api_url: Option<String>,
    pub request_timeout: Option<Duration>,
}

/// Where a resolved setting came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Explicit,
    Environment,
    ConfigFile,
    Default,
    Unset,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueSource::Explicit => "explicit",
            ValueSource::Environment => "environment",
            ValueSource::ConfigFile => "config file",
            ValueSource::Default => "default",
            ValueSource::Unset => "unset",
        };
        f.write_str(s)
    }
}

/// Resolved provider configuration
#[derive(Clone)]
pub struct ProviderConfig {
    api_token: Option<Arc<SecretString>>,
    api_url: Url,
    request_timeout: Duration,
    token_source: ValueSource,
    url_source: ValueSource,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Build a configuration directly, bypassing environment and file lookup
    pub fn new(api_url: &str, api_token: Option<&str>) -> Result<Self, ProviderError> {
        Ok(Self {
            api_token: api_token.map(|t| Arc::new(SecretString::new(t.to_string()))),
            api_url: parse_api_url(api_url)?,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            token_source: if api_token.is_some() {
                ValueSource::Explicit
            } else {
                ValueSource::Unset
            },
            url_source: ValueSource::Explicit,
        })
    }

    /// Resolve against the process environment
    pub fn resolve(overrides: &ConfigOverrides, file: &ConfigFile) -> Result<Self, ProviderError> {
        Self::resolve_with(overrides, file, |key| std::env::var(key).ok())
    }

    /// Resolve with an injectable environment lookup
    pub fn resolve_with<F>(
        overrides: &ConfigOverrides,
        file: &ConfigFile,
        env: F,
    ) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        let (token, token_source) = pick(
            overrides.api_token.clone(),
            env(API_TOKEN_ENV),
            file.api_token.clone(),
            None,
        );
        let (url, url_source) = pick(
            overrides.api_url.clone(),
            env(API_URL_ENV),
            file.api_url.clone(),
            Some(DEFAULT_API_URL.to_string()),
        );
        let url = url.unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let request_timeout = overrides
            .request_timeout
            .or_else(|| file.request_timeout_secs.map(Duration::from_secs))
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Self {
            api_token: token.map(|t| Arc::new(SecretString::new(t))),
            api_url: parse_api_url(&url)?,
            request_timeout,
            token_source,
            url_source,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn has_token(&self) -> bool {
        self.api_token.is_some()
    }

    /// The API token; remote calls cannot be made without one
    pub fn require_token(&self) -> Result<&str, ProviderError> {
        self.api_token
            .as_deref()
            .map(|t| t.expose_secret().as_str())
            .ok_or_else(|| {
                ProviderError::Config(format!(
                    "apiToken is required; set {} or pass it explicitly",
                    API_TOKEN_ENV
                ))
            })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn token_source(&self) -> ValueSource {
        self.token_source
    }

    pub fn url_source(&self) -> ValueSource {
        self.url_source
    }
}

fn pick(
    explicit: Option<String>,
    env: Option<String>,
    file: Option<String>,
    default: Option<String>,
) -> (Option<String>, ValueSource) {
    if explicit.is_some() {
        (explicit, ValueSource::Explicit)
    } else if env.is_some() {
        (env, ValueSource::Environment)
    } else if file.is_some() {
        (file, ValueSource::ConfigFile)
    } else if default.is_some() {
        (default, ValueSource::Default)
    } else {
        (None, ValueSource::Unset)
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ProviderError::Config(format!("invalid apiUrl '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProviderError::Config(format!(
            "apiUrl must use http or https, got '{}'",
            other
        ))),
    }
}
