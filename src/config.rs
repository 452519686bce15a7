//! Runtime configuration.
//!
//! Read from environment variables, falling back to defaults suitable for an
//! in-cluster deployment with cert-manager issued certificates mounted at
//! `/etc/webhook/certs/`.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9502;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;
/// Default CPU mask check timeout in milliseconds
pub const CPU_MASK_CHECK_TIMEOUT_MS: u64 = 3000;
/// Default guaranteed instance-manager CPU for the v2 data engine, in millicpu
pub const GUARANTEED_INSTANCE_MANAGER_CPU: u64 = 1250;

/// Errors raised while loading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Webhook configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: String,
    pub key_path: String,
    /// Upper bound for a single CPU mask check
    pub cpu_mask_check_timeout: Duration,
    /// CPU budget a v2 instance manager's mask may select, in millicpu
    pub guaranteed_instance_manager_cpu: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: WEBHOOK_CERT_PATH.to_string(),
            key_path: WEBHOOK_KEY_PATH.to_string(),
            cpu_mask_check_timeout: Duration::from_millis(CPU_MASK_CHECK_TIMEOUT_MS),
            guaranteed_instance_manager_cpu: GUARANTEED_INSTANCE_MANAGER_CPU,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout_ms = parse_or(&lookup, "CPU_MASK_CHECK_TIMEOUT_MS", CPU_MASK_CHECK_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CPU_MASK_CHECK_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            webhook_port: parse_or(&lookup, "WEBHOOK_PORT", defaults.webhook_port)?,
            health_port: parse_or(&lookup, "HEALTH_PORT", defaults.health_port)?,
            cert_path: lookup("WEBHOOK_CERT_PATH").unwrap_or(defaults.cert_path),
            key_path: lookup("WEBHOOK_KEY_PATH").unwrap_or(defaults.key_path),
            cpu_mask_check_timeout: Duration::from_millis(timeout_ms),
            guaranteed_instance_manager_cpu: parse_or(
                &lookup,
                "GUARANTEED_INSTANCE_MANAGER_CPU",
                defaults.guaranteed_instance_manager_cpu,
            )?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}
