//! Client configuration loaded from TOML
//!
//! Lookup order: explicit path, then `<config dir>/asamblea.toml`, then
//! built-in defaults. A few environment variables override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::reconcile::DEFAULT_EVENT_LOG_CAPACITY;

/// Config file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "asamblea.toml";

/// Environment variable overriding `backend.base_url`
pub const ENV_API_URL: &str = "ASAMBLEA_API_URL";

/// Environment variable overriding `backend.business_id`
pub const ENV_BUSINESS_ID: &str = "ASAMBLEA_BUSINESS_ID";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub stream: StreamConfig,
    pub reconcile: ReconcileConfig,
    pub query: QueryConfig,
    pub public_url: PublicUrlConfig,
}

/// REST backend location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub business_id: Option<Uuid>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            business_id: None,
            timeout_secs: 15,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the bearer token comes from. Issuing tokens is not our job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub token_env: String,
    pub token_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: "ASAMBLEA_TOKEN".to_string(),
            token_file: None,
        }
    }
}

impl AuthConfig {
    /// Resolve the token: inline value, then env var, then token file.
    /// `None` means the session has to be treated as expired.
    pub fn resolve_token(&self) -> Option<String> {
        let clean = |s: String| {
            let s = s.trim().to_string();
            (!s.is_empty()).then_some(s)
        };

        if let Some(token) = self.token.clone().and_then(clean) {
            return Some(token);
        }
        if let Some(token) = std::env::var(&self.token_env).ok().and_then(clean) {
            return Some(token);
        }
        if let Some(path) = &self.token_file {
            match std::fs::read_to_string(path) {
                Ok(content) => return clean(content),
                Err(e) => debug!(path = %path.display(), error = %e, "Token file unreadable"),
            }
        }
        None
    }
}

/// Live event stream tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Reconnect delays; the last entry repeats
    pub reconnect_delays_ms: Vec<u64>,
    /// Random extra delay as a fraction of the base delay
    pub jitter_ratio: f64,
    /// Bound of the event channel between stream task and session
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delays_ms: vec![1000, 2000, 5000, 10000, 30000],
            jitter_ratio: 0.2,
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub event_log_capacity: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub debounce_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl QueryConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicUrlConfig {
    pub expires_in_hours: u32,
}

impl Default for PublicUrlConfig {
    fn default() -> Self {
        Self {
            expires_in_hours: 24,
        }
    }
}

impl Config {
    /// Parse configuration from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&content)
    }

    /// Load from `path`, falling back to the default location and then to
    /// defaults, and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::load_from(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// `<platform config dir>/asamblea.toml`, if a home directory exists
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "asamblea", "asamblea")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.backend.base_url = url.trim().to_string();
            }
        }
        if let Ok(raw) = std::env::var(ENV_BUSINESS_ID) {
            let id = Uuid::parse_str(raw.trim()).map_err(|_| {
                Error::Config(format!("{} is not a valid UUID: '{}'", ENV_BUSINESS_ID, raw))
            })?;
            self.backend.business_id = Some(id);
        }
        Ok(())
    }

    /// Reject settings the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(Error::Config("backend.base_url is empty".into()));
        }
        if self.stream.reconnect_delays_ms.is_empty() {
            return Err(Error::Config("stream.reconnect_delays_ms is empty".into()));
        }
        if !(0.0..=1.0).contains(&self.stream.jitter_ratio) {
            return Err(Error::Config(format!(
                "stream.jitter_ratio must be within [0, 1], got {}",
                self.stream.jitter_ratio
            )));
        }
        if self.stream.channel_capacity == 0 {
            return Err(Error::Config("stream.channel_capacity must be positive".into()));
        }
        if self.reconcile.event_log_capacity == 0 {
            return Err(Error::Config("reconcile.event_log_capacity must be positive".into()));
        }
        if self.public_url.expires_in_hours == 0 {
            return Err(Error::Config("public_url.expires_in_hours must be positive".into()));
        }
        Ok(())
    }

    /// Business id, required for every backend call
    pub fn business_id(&self) -> Result<Uuid> {
        self.backend.business_id.ok_or_else(|| {
            Error::Config(format!(
                "no business id configured (set backend.business_id or {})",
                ENV_BUSINESS_ID
            ))
        })
    }
}
