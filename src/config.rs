//! Environment-driven configuration.

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_WRITE_RETRIES: u32 = 5;
pub const DEFAULT_LOG_FILTER: &str = "coursehub=info,sqlx=warn";

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub service: ServiceConfig,
    pub log_filter: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// How many times a write that lost an optimistic-concurrency race is replayed.
    pub write_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
                max_connections: parse_var(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                )?,
            },
            service: ServiceConfig {
                write_retries: parse_var("COURSEHUB_WRITE_RETRIES", DEFAULT_WRITE_RETRIES)?,
            },
            log_filter: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
