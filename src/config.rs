use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::projection::WorkerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => bail!("unknown storage backend: {}", other),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub operation_timeout: Duration,
    pub projection_poll_interval: Duration,
    pub projection_batch_size: usize,
    /// `None` leaves the metrics endpoint off.
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Memory,
        };
        let database_url = lookup("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        let projection_batch_size = parse_or(&lookup, "PROJECTION_BATCH_SIZE", 100)?;
        if projection_batch_size == 0 {
            bail!("PROJECTION_BATCH_SIZE must be at least 1");
        }

        Ok(Self {
            storage_backend,
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            operation_timeout: Duration::from_millis(parse_or(&lookup, "OPERATION_TIMEOUT_MS", 5_000)?),
            projection_poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "PROJECTION_POLL_INTERVAL_MS",
                500,
            )?),
            projection_batch_size,
            metrics_port: lookup("METRICS_PORT")
                .map(|port| port.parse().context("METRICS_PORT must be a valid port"))
                .transpose()?,
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            batch_size: self.projection_batch_size,
            poll_interval: self.projection_poll_interval,
            ..WorkerConfig::default()
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.operation_timeout, Duration::from_secs(5));
        assert_eq!(config.projection_batch_size, 100);
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert!(Config::from_lookup(lookup(&[("STORAGE_BACKEND", "postgres")])).is_err());

        let config = Config::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/footy"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert_eq!(config.database_max_connections, 4);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("OPERATION_TIMEOUT_MS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("METRICS_PORT", "99999")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STORAGE_BACKEND", "scylla")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PROJECTION_BATCH_SIZE", "0")])).is_err());
    }

    #[test]
    fn test_worker_config_follows_settings() {
        let config = Config::from_lookup(lookup(&[
            ("PROJECTION_BATCH_SIZE", "25"),
            ("PROJECTION_POLL_INTERVAL_MS", "50"),
        ]))
        .unwrap();
        let worker = config.worker_config();
        assert_eq!(worker.batch_size, 25);
        assert_eq!(worker.poll_interval, Duration::from_millis(50));
    }
}
