//! Environment-driven configuration.
//!
//! A single value decides whether the storage layer is active at all:
//! `DATABASE_URL`. When it is unset (or blank) every operation reports
//! "disabled" and callers fall back to their file-based mechanism.

use std::env;
use std::time::Duration;

use once_cell::sync::Lazy;

/// `.env` is loaded at most once, before the first environment read.
static DOTENV: Lazy<()> = Lazy::new(|| {
    dotenvy::dotenv().ok();
});

/// Connection string for the PostgreSQL backend, if configured.
///
/// Whitespace-only values count as unset.
pub fn database_url() -> Option<String> {
    Lazy::force(&DOTENV);
    let url = env::var("DATABASE_URL").ok()?;
    let url = url.trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

/// True when `DATABASE_URL` is configured.
pub fn is_enabled() -> bool {
    database_url().is_some()
}

/// Pool sizing and per-statement timeout.
///
/// Defaults match the observed production range (1..=10 connections,
/// 30 s command timeout); each value can be overridden via environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub min_size: u32,
    pub max_size: u32,
    pub command_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            command_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// Read overrides from `DATABASE_POOL_MIN_SIZE`,
    /// `DATABASE_POOL_MAX_SIZE` and `DATABASE_COMMAND_TIMEOUT_SECS`;
    /// unparsable or absent values keep their defaults.
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV);
        let defaults = Self::default();
        Self {
            min_size: env_parse("DATABASE_POOL_MIN_SIZE").unwrap_or(defaults.min_size),
            max_size: env_parse("DATABASE_POOL_MAX_SIZE").unwrap_or(defaults.max_size),
            command_timeout: env_parse("DATABASE_COMMAND_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.command_timeout),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_range() {
        let config = PoolConfig::default();
        assert_eq!(config.min_size, 1);
        assert_eq!(config.max_size, 10);
        assert_eq!(config.command_timeout, Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_are_applied() {
        env::set_var("DATABASE_POOL_MAX_SIZE", "4");
        env::set_var("DATABASE_COMMAND_TIMEOUT_SECS", "5");
        let config = PoolConfig::from_env();
        assert_eq!(config.max_size, 4);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        // Unset values keep their defaults.
        assert_eq!(config.min_size, 1);
        env::remove_var("DATABASE_POOL_MAX_SIZE");
        env::remove_var("DATABASE_COMMAND_TIMEOUT_SECS");
    }

    #[test]
    fn garbage_overrides_fall_back_to_defaults() {
        env::set_var("DATABASE_POOL_MIN_SIZE", "not-a-number");
        let config = PoolConfig::from_env();
        assert_eq!(config.min_size, 1);
        env::remove_var("DATABASE_POOL_MIN_SIZE");
    }
}
