//! Configuration loading.
//!
//! Defaults are resolved once at process start: the `.env` file seeds the
//! environment, the environment overrides the built-in defaults, and explicit
//! arguments override both.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{AppError, AppResult};
use crate::models::connection::ConnectionConfig;

pub const DEFAULT_DB_USERNAME: &str = "root";
pub const DEFAULT_DB_PASSWORD: &str = "root";
pub const DEFAULT_DB_NAME: &str = "test";
pub const DEFAULT_DB_DRIVER: &str = "mysql";
pub const DEFAULT_DB_HOST: &str = "127.0.0.1";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_REDIS_HOST: &str = "localhost";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_DB: i64 = 0;
pub const DEFAULT_REDIS_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Outcome of loading the `.env` file.
#[derive(Debug)]
pub enum EnvFile {
    /// Variables were loaded from this file.
    Loaded(PathBuf),
    /// No `.env` file was found.
    Missing,
    /// The file exists but could not be parsed.
    Invalid(String),
}

impl EnvFile {
    /// Logs the outcome. Call after the tracing subscriber is installed.
    pub fn log(&self) {
        match self {
            EnvFile::Loaded(path) => {
                tracing::debug!(path = %path.display(), "Loaded environment variables")
            }
            EnvFile::Missing => tracing::debug!("No .env file found, using environment and defaults"),
            EnvFile::Invalid(error) => {
                tracing::warn!(error = %error, "Failed to load .env file, using environment and defaults")
            }
        }
    }
}

/// Loads `.env` from the working directory or its parents.
///
/// Variables already present in the process environment are not overridden.
pub fn load_env_file() -> EnvFile {
    match dotenvy::dotenv() {
        Ok(path) => EnvFile::Loaded(path),
        Err(e) if e.not_found() => EnvFile::Missing,
        Err(e) => EnvFile::Invalid(e.to_string()),
    }
}

fn string_var<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {:?}", key, raw))),
        _ => Ok(default),
    }
}

/// SQL utility configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Default connection fields.
    pub connection: ConnectionConfig,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

/// Explicit connection arguments; `None` keeps the resolved default.
#[derive(Debug, Clone, Default)]
pub struct DbOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
    pub driver: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl DbConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            connection: ConnectionConfig {
                username: string_var(&lookup, "DB_USERNAME", DEFAULT_DB_USERNAME),
                password: string_var(&lookup, "DB_PASSWORD", DEFAULT_DB_PASSWORD),
                dbname: string_var(&lookup, "DB_DBNAME", DEFAULT_DB_NAME),
                driver: string_var(&lookup, "DB_DRIVER", DEFAULT_DB_DRIVER),
                host: string_var(&lookup, "DB_HOST", DEFAULT_DB_HOST),
                port: parse_var(&lookup, "DB_PORT", DEFAULT_DB_PORT)?,
            },
            connect_timeout_secs: parse_var(
                &lookup,
                "DB_CONNECT_TIMEOUT",
                DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            )?,
        })
    }

    /// Applies explicit arguments on top of the resolved defaults.
    pub fn with_overrides(mut self, overrides: DbOverrides) -> Self {
        let conn = &mut self.connection;
        if let Some(username) = overrides.username {
            conn.username = username;
        }
        if let Some(password) = overrides.password {
            conn.password = password;
        }
        if let Some(dbname) = overrides.dbname {
            conn.dbname = dbname;
        }
        if let Some(driver) = overrides.driver {
            conn.driver = driver;
        }
        if let Some(host) = overrides.host {
            conn.host = host;
        }
        if let Some(port) = overrides.port {
            conn.port = port;
        }
        self
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                username: DEFAULT_DB_USERNAME.to_string(),
                password: DEFAULT_DB_PASSWORD.to_string(),
                dbname: DEFAULT_DB_NAME.to_string(),
                driver: DEFAULT_DB_DRIVER.to_string(),
                host: DEFAULT_DB_HOST.to_string(),
                port: DEFAULT_DB_PORT,
            },
            connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Redis utility configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Logical database index.
    pub db: i64,
    /// `None` when `REDIS_PASSWORD` is unset or empty.
    pub password: Option<String>,
    /// Require values to be valid UTF-8 instead of rendering them lossily.
    pub decode_responses: bool,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

/// Explicit Redis arguments; `None` keeps the resolved default.
#[derive(Debug, Clone, Default)]
pub struct RedisOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<i64>,
    pub password: Option<String>,
}

impl RedisConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: string_var(&lookup, "REDIS_HOST", DEFAULT_REDIS_HOST),
            port: parse_var(&lookup, "REDIS_PORT", DEFAULT_REDIS_PORT)?,
            db: parse_var(&lookup, "REDIS_DB", DEFAULT_REDIS_DB)?,
            password: lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()),
            decode_responses: true,
            connect_timeout_secs: parse_var(
                &lookup,
                "REDIS_CONNECT_TIMEOUT",
                DEFAULT_REDIS_CONNECT_TIMEOUT_SECS,
            )?,
        })
    }

    /// Applies explicit arguments on top of the resolved defaults.
    pub fn with_overrides(mut self, overrides: RedisOverrides) -> Self {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(db) = overrides.db {
            self.db = db;
        }
        if let Some(password) = overrides.password {
            self.password = Some(password).filter(|p| !p.is_empty());
        }
        self
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REDIS_HOST.to_string(),
            port: DEFAULT_REDIS_PORT,
            db: DEFAULT_REDIS_DB,
            password: None,
            decode_responses: true,
            connect_timeout_secs: DEFAULT_REDIS_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_db_defaults() {
        let config = DbConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.connection, DbConfig::default().connection);
        assert_eq!(config.connection.port, 3306);
        assert_eq!(config.connection.driver, "mysql");
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DB_DRIVER", "postgresql"),
            ("DB_PORT", "5432"),
            ("DB_HOST", "db.internal"),
        ]))
        .unwrap();
        assert_eq!(config.connection.driver, "postgresql");
        assert_eq!(config.connection.port, 5432);
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.username, "root");
    }

    #[test]
    fn test_explicit_overrides_env() {
        let config = DbConfig::from_lookup(lookup(&[("DB_USERNAME", "env-user")]))
            .unwrap()
            .with_overrides(DbOverrides {
                username: Some("cli-user".into()),
                port: Some(13306),
                ..Default::default()
            });
        assert_eq!(config.connection.username, "cli-user");
        assert_eq!(config.connection.port, 13306);
        assert_eq!(config.connection.dbname, "test");
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let err = DbConfig::from_lookup(lookup(&[("DB_PORT", "abc")])).unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.contains("DB_PORT")));
    }

    #[test]
    fn test_redis_defaults() {
        let config = RedisConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RedisConfig::default());
    }

    #[test]
    fn test_redis_empty_password_means_none() {
        let config = RedisConfig::from_lookup(lookup(&[("REDIS_PASSWORD", "")])).unwrap();
        assert_eq!(config.password, None);

        let config = RedisConfig::from_lookup(lookup(&[("REDIS_PASSWORD", "s3cret")])).unwrap();
        assert_eq!(config.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_redis_overrides() {
        let config = RedisConfig::from_lookup(lookup(&[("REDIS_DB", "3")]))
            .unwrap()
            .with_overrides(RedisOverrides {
                host: Some("cache".into()),
                db: Some(5),
                ..Default::default()
            });
        assert_eq!(config.host, "cache");
        assert_eq!(config.db, 5);
        assert_eq!(config.port, 6379);
    }
}
