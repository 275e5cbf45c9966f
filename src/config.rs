// src/config.rs

use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// aamarPay gateway settings. Credentials and the three redirect URLs the
/// gateway sends the customer back through.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub store_id: String,
    pub signature_key: String,
    pub endpoint_url: String,
    pub success_url: String,
    pub fail_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    /// Custom S3-compatible endpoint (MinIO, Beget). Standard AWS when unset.
    pub endpoint: Option<String>,
}

/// Immutable process configuration, built once at startup and passed by
/// reference into constructors. Nothing reads the environment after this.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub bind_port: u16,
    pub jwt_secret: String,
    pub amqp_url: Option<String>,
    pub sweep_interval_secs: u64,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_port = match env::var("BIND_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid("BIND_PORT", e.to_string()))?,
            Err(_) => 8080,
        };

        let sweep_interval_secs = match env::var("SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid("SWEEP_INTERVAL_SECS", e.to_string()))?,
            Err(_) => 60,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            bind_port,
            jwt_secret: required("JWT_SECRET")?,
            amqp_url: env::var("RABBITMQ_URL").ok(),
            sweep_interval_secs,
            gateway: GatewayConfig {
                store_id: required("AAMARPAY_STORE_ID")?,
                signature_key: required("AAMARPAY_SIGNATURE_KEY")?,
                endpoint_url: env::var("AAMARPAY_ENDPOINT_URL")
                    .unwrap_or_else(|_| "https://sandbox.aamarpay.com/jsonpost.php".to_string()),
                success_url: required("AAMARPAY_SUCCESS_URL")?,
                fail_url: required("AAMARPAY_FAIL_URL")?,
                cancel_url: required("AAMARPAY_CANCEL_URL")?,
            },
            storage: StorageConfig {
                bucket: required("S3_BUCKET")?,
                endpoint: env::var("S3_ENDPOINT").ok(),
            },
        })
    }
}
