use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use explorer_engine::{ChartSettings, EngineSettings, ExplorerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_limit_mb: usize,
    pub session_timeout_mins: u64,
    pub cleanup_interval_secs: u64,
    pub preview_rows: usize,
    pub font_family: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            upload_limit_mb: 200,
            session_timeout_mins: 30,
            cleanup_interval_secs: 60,
            preview_rows: 5,
            font_family: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ExplorerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from a key lookup; unset keys keep their
    /// defaults and unparsable values are rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ExplorerError> {
        let defaults = Self::default();
        let config = Self {
            host: lookup("EXPLORER_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "EXPLORER_PORT", defaults.port)?,
            upload_limit_mb: parse_or(&lookup, "EXPLORER_UPLOAD_LIMIT_MB", defaults.upload_limit_mb)?,
            session_timeout_mins: parse_or(
                &lookup,
                "EXPLORER_SESSION_TIMEOUT_MINS",
                defaults.session_timeout_mins,
            )?,
            cleanup_interval_secs: parse_or(
                &lookup,
                "EXPLORER_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval_secs,
            )?,
            preview_rows: parse_or(&lookup, "EXPLORER_PREVIEW_ROWS", defaults.preview_rows)?,
            font_family: lookup("EXPLORER_FONT_FAMILY").filter(|f| !f.trim().is_empty()),
        };

        if config.cleanup_interval_secs == 0 {
            return Err(ExplorerError::Config {
                message: "EXPLORER_CLEANUP_INTERVAL_SECS must be greater than zero".to_string(),
            });
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ExplorerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ExplorerError::Config {
                message: format!("Invalid host or port '{}:{}': {}", self.host, self.port, e),
            })
    }

    pub fn upload_limit_bytes(&self) -> usize {
        self.upload_limit_mb.saturating_mul(1024 * 1024)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            preview_rows: self.preview_rows,
            charts: ChartSettings {
                font_family: self.font_family.clone(),
                ..ChartSettings::default()
            },
            session_timeout: Duration::from_secs(self.session_timeout_mins.saturating_mul(60)),
            ..EngineSettings::default()
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ExplorerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| ExplorerError::Config {
            message: format!("Invalid {} '{}': {}", key, raw, e),
        }),
    }
}
