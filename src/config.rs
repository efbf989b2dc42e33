//! Runtime configuration from environment variables

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub database_max_connections: u32,
    /// Run the monthly sweep in-process
    pub sweep_enabled: bool,
    /// UTC hour (0-23) at which the sweep fires on the 1st of the month
    pub sweep_hour_utc: u32,
    pub arrears_cache_ttl: Duration,
}

impl Config {
    /// Load configuration, reading a `.env` file first if one exists
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let sweep_hour_utc: u32 = parse_var("SWEEP_HOUR_UTC", 3)?;
        if sweep_hour_utc > 23 {
            anyhow::bail!("SWEEP_HOUR_UTC must be between 0 and 23, got {}", sweep_hour_utc);
        }

        Ok(Self {
            database_url,
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            sweep_enabled: parse_var("SWEEP_ENABLED", true)?,
            sweep_hour_utc,
            arrears_cache_ttl: Duration::from_secs(parse_var("ARREARS_CACHE_TTL_SECS", 300)?),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let value: u32 = parse_var("CABLE_BILLING_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_var_reads_value() {
        std::env::set_var("CABLE_BILLING_TEST_HOUR", " 5 ");
        let value: u32 = parse_var("CABLE_BILLING_TEST_HOUR", 3).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        std::env::set_var("CABLE_BILLING_TEST_FLAG", "maybe");
        assert!(parse_var::<bool>("CABLE_BILLING_TEST_FLAG", true).is_err());
    }
}
