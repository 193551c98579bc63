//! Process configuration read from the environment at startup

use std::time::Duration;

use thiserror::Error;

/// Coordination-service connect string, e.g. `zookeeper:2181`
pub const ZOOKEEPER_URL_ENV: &str = "ZOOKEEPER_URL";
pub const ZOOKEEPER_TIMEOUT_ENV: &str = "ZOOKEEPER_TIMEOUT_SECS";
pub const WEBHOOK_CERT_PATH_ENV: &str = "WEBHOOK_CERT_PATH";
pub const WEBHOOK_KEY_PATH_ENV: &str = "WEBHOOK_KEY_PATH";
pub const WEBHOOK_PORT_ENV: &str = "WEBHOOK_PORT";
pub const HEALTH_PORT_ENV: &str = "HEALTH_PORT";

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;
/// Default health/metrics server port
pub const HEALTH_PORT: u16 = 8080;
/// Default bound on a single ZooKeeper operation
pub const ZOOKEEPER_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration, built once and passed to the components that need it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    pub zookeeper_url: String,
    pub zookeeper_timeout: Duration,
    pub cert_path: String,
    pub key_path: String,
    pub webhook_port: u16,
    pub health_port: u16,
}

impl WebhookConfig {
    /// Configuration with defaults for everything but the ZooKeeper address
    pub fn new(zookeeper_url: impl Into<String>) -> Self {
        Self {
            zookeeper_url: zookeeper_url.into(),
            zookeeper_timeout: Duration::from_secs(ZOOKEEPER_TIMEOUT_SECS),
            cert_path: WEBHOOK_CERT_PATH.to_string(),
            key_path: WEBHOOK_KEY_PATH.to_string(),
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
        }
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let zookeeper_url = lookup(ZOOKEEPER_URL_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(ZOOKEEPER_URL_ENV))?;

        let mut config = Self::new(zookeeper_url);

        if let Some(path) = lookup(WEBHOOK_CERT_PATH_ENV) {
            config.cert_path = path;
        }
        if let Some(path) = lookup(WEBHOOK_KEY_PATH_ENV) {
            config.key_path = path;
        }
        if let Some(value) = lookup(WEBHOOK_PORT_ENV) {
            config.webhook_port = parse_port(WEBHOOK_PORT_ENV, &value)?;
        }
        if let Some(value) = lookup(HEALTH_PORT_ENV) {
            config.health_port = parse_port(HEALTH_PORT_ENV, &value)?;
        }
        if let Some(value) = lookup(ZOOKEEPER_TIMEOUT_ENV) {
            let secs: u64 = value.trim().parse().map_err(|e| ConfigError::Invalid {
                name: ZOOKEEPER_TIMEOUT_ENV,
                value: value.clone(),
                reason: format!("{}", e),
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: ZOOKEEPER_TIMEOUT_ENV,
                    value,
                    reason: "must be at least 1 second".to_string(),
                });
            }
            config.zookeeper_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_port(name: &'static str, value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "port 0 is not allowed".to_string(),
        }),
        Ok(port) => Ok(port),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}
