use serde::Deserialize;
use std::env;
use std::time::Duration;

use campus_catalog::{PricingConfig, PricingError};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_markup_rate")]
    pub markup_rate: f64,
    #[serde(default = "default_delivery_fee_cents")]
    pub delivery_fee_cents: i64,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
    #[serde(default = "default_confirmation_window")]
    pub confirmation_window_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
}

fn default_markup_rate() -> f64 { 0.10 }
fn default_delivery_fee_cents() -> i64 { 1_000 }
fn default_commission_rate() -> f64 { 0.05 }
fn default_confirmation_window() -> u64 { 300 }
fn default_sweep_interval() -> u64 { 30 }
fn default_sweep_batch_size() -> usize { 100 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            markup_rate: default_markup_rate(),
            delivery_fee_cents: default_delivery_fee_cents(),
            commission_rate: default_commission_rate(),
            confirmation_window_seconds: default_confirmation_window(),
            sweep_interval_seconds: default_sweep_interval(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

impl BusinessRules {
    pub fn pricing_config(&self) -> Result<PricingConfig, PricingError> {
        PricingConfig::from_rates(self.markup_rate, self.delivery_fee_cents, self.commission_rate)
    }

    pub fn confirmation_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.confirmation_window_seconds as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout_ms() -> u64 { 3_000 }
fn default_timeout_ms() -> u64 { 5_000 }

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Rate limiting and the sweeper lease are off without it
    pub url: Option<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 120 }

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CAMPUS__DATABASE__URL`
            .add_source(config::Environment::with_prefix("CAMPUS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(raw: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = from_toml(
            r#"
            [server]
            port = 8080
            [database]
            url = "postgres://localhost/campus"
            [auth]
            jwt_secret = "s"
            [business_rules]
            delivery_fee_cents = 1000
            "#,
        );

        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert!(config.redis.url.is_none());
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.business_rules.confirmation_window(), chrono::Duration::minutes(5));
        assert_eq!(config.business_rules.pricing_config().unwrap(), PricingConfig::default());
    }

    #[test]
    fn test_memory_backend_selected() {
        let config = from_toml(
            r#"
            [server]
            port = 3000
            [storage]
            backend = "memory"
            [database]
            url = "unused"
            [auth]
            jwt_secret = "s"
            [business_rules]
            markup_rate = 0.05
            sweep_batch_size = 10
            "#,
        );

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.business_rules.pricing_config().unwrap().markup_rate_bps, 500);
        assert_eq!(config.business_rules.sweep_batch_size, 10);
    }
}
