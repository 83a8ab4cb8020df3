//! Configuration management for the Appointment Service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Which repository implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redis,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StorageBackend::Redis),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

/// Email delivery settings
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// When false, emails are only written to the log
    pub enabled: bool,

    /// HTTP endpoint of the email provider
    pub provider_url: Option<String>,

    /// Bearer token for the provider
    pub api_key: Option<String>,

    /// Sender address
    pub from: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Repository backend
    pub storage_backend: StorageBackend,

    /// Redis connection URL
    pub redis_url: String,

    /// Interval of the fallback reconciliation poll
    pub reconcile_interval_secs: u64,

    pub email: EmailConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8090".to_string())
                .parse()
                .context("Invalid API_PORT")?,

            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "redis".to_string())
                .parse::<StorageBackend>()
                .map_err(anyhow::Error::msg)
                .context("Invalid STORAGE_BACKEND (expected redis/memory)")?,

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            reconcile_interval_secs: env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid RECONCILE_INTERVAL_SECS")?,

            email: EmailConfig {
                enabled: env::var("EMAIL_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .context("Invalid EMAIL_ENABLED (expected true/false)")?,
                provider_url: env::var("EMAIL_PROVIDER_URL").ok(),
                api_key: env::var("EMAIL_API_KEY").ok(),
                from: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "ClassBook <no-reply@classbook.local>".to_string()),
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.reconcile_interval_secs == 0 {
            anyhow::bail!("RECONCILE_INTERVAL_SECS must be greater than 0");
        }

        if self.email.enabled && self.email.provider_url.is_none() {
            anyhow::bail!("EMAIL_PROVIDER_URL is required when EMAIL_ENABLED=true");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            api_host: "127.0.0.1".to_string(),
            api_port: 9000,
            storage_backend: StorageBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            reconcile_interval_secs: 30,
            email: EmailConfig {
                enabled: false,
                provider_url: None,
                api_key: None,
                from: "ClassBook <no-reply@classbook.local>".to_string(),
            },
        }
    }

    #[test]
    fn test_api_address() {
        assert_eq!(sample().api_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            api_port: 0,
            ..sample()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("API_PORT must be greater than 0"));
    }

    #[test]
    fn test_validate_email_requires_provider() {
        let mut config = sample();
        config.email.enabled = true;
        assert!(config.validate().is_err());

        config.email.provider_url = Some("https://mail.example/send".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("Redis".parse::<StorageBackend>(), Ok(StorageBackend::Redis));
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }
}
