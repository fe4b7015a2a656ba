//! Store configuration loaded from `subledger.toml`.
//!
//! ```toml
//! [database]
//! url = "${DATABASE_URL}"
//! max_connections = 16
//! query_timeout_ms = 5000
//!
//! [migrations]
//! dir = "migrations"
//! ```
//!
//! `${VAR}` references in string values are expanded from the environment at load time.

use crate::error::{StoreError, StoreResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "subledger.toml";

const DEFAULT_MAX_CONNECTIONS: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Per-call deadline in milliseconds. Absent means no deadline.
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrationsConfig {
    /// Directory of `V{n}__{name}.sql` files. Absent means the embedded set.
    pub dir: Option<String>,
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

impl StoreConfig {
    /// Configuration with defaults for everything but the URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.into(),
                max_connections: DEFAULT_MAX_CONNECTIONS,
                query_timeout_ms: None,
            },
            migrations: MigrationsConfig::default(),
        }
    }

    /// Read, expand and validate a config file.
    ///
    /// A relative `migrations.dir` is resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&raw)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;

        if let Some(dir) = config.migrations.dir.as_mut() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let resolved: PathBuf = if Path::new(dir.as_str()).is_absolute() {
                PathBuf::from(dir.as_str())
            } else {
                base.join(dir.as_str())
            };
            *dir = resolved.to_string_lossy().into_owned();
        }
        Ok(config)
    }

    /// Parse, expand and validate TOML text.
    pub fn from_toml_str(raw: &str) -> StoreResult<Self> {
        let mut config: Self = toml::from_str(raw)
            .map_err(|e| StoreError::Config(format!("failed to parse config: {e}")))?;
        config.expand_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the database URL, e.g. from a command-line flag.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database.url = url.into();
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.database.query_timeout_ms.map(Duration::from_millis)
    }

    fn expand_env(&mut self) -> StoreResult<()> {
        self.database.url = expand_env_vars(&self.database.url)?;
        if let Some(dir) = self.migrations.dir.as_mut() {
            *dir = expand_env_vars(dir)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(StoreError::Config("database.url must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(StoreError::Config(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.database.query_timeout_ms == Some(0) {
            return Err(StoreError::Config(
                "database.query_timeout_ms must be positive; omit it to disable".into(),
            ));
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> StoreResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(StoreError::Config(format!(
                    "unterminated env var reference: ${{{key}"
                )));
            }
            if key.is_empty() {
                return Err(StoreError::Config("invalid env var reference: ${}".into()));
            }

            let v = std::env::var(&key).map_err(|_| {
                StoreError::Config(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
