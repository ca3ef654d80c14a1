//! Process configuration: Redis connection settings and bucket capacity.

use std::fs;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CAPACITY: usize = 3;

/// Bytes escaped in the password part of a connection URL (RFC 3986 unreserved kept).
const PASSWORD_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`ReqbotConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// A setting is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration, usually loaded from `reqbot.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReqbotConfig {
    /// Redis connection settings.
    #[serde(default)]
    pub redis: RedisSettings,
    /// Request capture settings.
    #[serde(default)]
    pub requests: RequestSettings,
}

/// Where and how to reach Redis.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisSettings {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Optional `AUTH` password.
    pub password: Option<String>,
    /// Logical database number.
    pub index: i64,
    /// Name registered with `CLIENT SETNAME`.
    pub client: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            password: None,
            index: 0,
            client: "REQBOT".into(),
        }
    }
}

/// Request bucket settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Number of requests retained per bucket.
    pub capacity: usize,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ReqbotConfig {
    /// Load configuration from `path` (or defaults when `None`), apply
    /// `REQBOT_*` environment overrides, and validate the result.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// override is malformed, or a setting is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides looked up through `lookup` (normally the process environment).
    ///
    /// Recognized variables: `REQBOT_REDIS_HOST`, `REQBOT_REDIS_PORT`,
    /// `REQBOT_REDIS_PASSWORD`, `REQBOT_REDIS_INDEX`, `REQBOT_BUCKET_CAPACITY`.
    /// Empty values are ignored.
    ///
    /// # Errors
    /// Returns [`ConfigError::Env`] when a numeric variable does not parse.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.is_empty());

        if let Some(host) = get("REQBOT_REDIS_HOST") {
            self.redis.host = host;
        }
        if let Some(port) = get("REQBOT_REDIS_PORT") {
            self.redis.port = parse_var("REQBOT_REDIS_PORT", port)?;
        }
        if let Some(password) = get("REQBOT_REDIS_PASSWORD") {
            self.redis.password = Some(password);
        }
        if let Some(index) = get("REQBOT_REDIS_INDEX") {
            self.redis.index = parse_var("REQBOT_REDIS_INDEX", index)?;
        }
        if let Some(capacity) = get("REQBOT_BUCKET_CAPACITY") {
            self.requests.capacity = parse_var("REQBOT_BUCKET_CAPACITY", capacity)?;
        }
        Ok(self)
    }

    /// Reject settings that cannot work.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a zero capacity, a zero port, or a
    /// negative database index.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requests.capacity == 0 {
            return Err(ConfigError::Invalid("requests.capacity must be at least 1".into()));
        }
        if self.redis.port == 0 {
            return Err(ConfigError::Invalid("redis.port must not be 0".into()));
        }
        if self.redis.index < 0 {
            return Err(ConfigError::Invalid("redis.index must not be negative".into()));
        }
        Ok(())
    }

    /// Copy of the configuration that is safe to print.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.redis.has_password() {
            copy.redis.password = Some("***".into());
        }
        copy
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env { var, value })
}

impl RedisSettings {
    /// Whether a non-empty password is configured.
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Connection URL in `redis://[:password@]host:port/index` form.
    ///
    /// The password is percent-encoded.
    pub fn connection_url(&self) -> String {
        let auth = match self.password.as_deref() {
            Some(password) if !password.is_empty() => format!(":{}@", utf8_percent_encode(password, PASSWORD_ESCAPE_SET)),
            _ => String::new(),
        };
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.index)
    }
}
