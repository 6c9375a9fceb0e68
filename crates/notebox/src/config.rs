//! Environment driven configuration.
//!
//! Every config type has a `from_env` constructor used by the binaries and a
//! `from_lookup` constructor that takes the variable lookup as a closure, so
//! the defaults can be exercised without touching the process environment.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use redis::IntoConnectionInfo as _;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },

    #[error("invalid database configuration: {0}")]
    Database(#[from] sqlx::Error),
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_port(name: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidPort {
        name,
        value: value.to_string(),
    })
}

/// Connection settings for the relational store.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    /// When set, takes precedence over every other field.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());

        Ok(Self {
            host: lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_port("DB_PORT", &port)?,
            user: lookup("DB_USER").unwrap_or_else(|| "postgres".to_string()),
            password: lookup("DB_PASSWORD").unwrap_or_else(|| "postgres".to_string()),
            name: lookup("DB_NAME").unwrap_or_else(|| "infrastructure_training".to_string()),
            ssl_mode: lookup("DB_SSLMODE").unwrap_or_else(|| "disable".to_string()),
            url: lookup("DATABASE_URL"),
            max_connections: 5,
        })
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(PgConnectOptions::from_str(url)?);
        }

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(PgSslMode::from_str(&self.ssl_mode)?))
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[omitted]")
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .field("url", &self.url.as_ref().map(|_| "[omitted]"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Connection settings for the optional Redis cache.
#[derive(Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub disabled: bool,
    pub connect_timeout: Duration,
}

impl RedisConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("REDIS_PORT").unwrap_or_else(|| "6379".to_string());

        Ok(Self {
            host: lookup("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_port("REDIS_PORT", &port)?,
            password: lookup("REDIS_PASSWORD"),
            disabled: lookup("REDIS_DISABLED").is_some_and(|v| v == "true"),
            connect_timeout: Duration::from_secs(5),
        })
    }

    /// `host:port`, used for logging.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection details for database 0. The password is passed as is,
    /// never through a URL, so it may contain any character.
    pub fn connection_info(&self) -> redis::RedisResult<redis::ConnectionInfo> {
        let mut info = (self.host.clone(), self.port).into_connection_info()?;
        info.redis.db = 0;
        info.redis.password.clone_from(&self.password);
        Ok(info)
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "[omitted]"))
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout: Duration,
    pub shutdown_grace_period: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("PORT").unwrap_or_else(|| "8080".to_string());

        Ok(Self {
            port: parse_port("PORT", &port)?,
            request_timeout: Duration::from_secs(15),
            shutdown_grace_period: Duration::from_secs(30),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
