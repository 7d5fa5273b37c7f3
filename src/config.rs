//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::cache::CacheOptions;
use crate::error::{CacheError, Result};
use crate::policy::{validate_ttl, DEFAULT_CAPACITY, DEFAULT_TTL};

const DEFAULT_SWEEP_PERIOD_MS: u64 = 25;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Cache-wide TTL in milliseconds
    pub ttl_ms: u64,
    /// Whether `get` extends an entry's life
    pub sliding: bool,
    /// Background reaper period in milliseconds
    pub sweep_period_ms: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1024)
    /// - `CACHE_TTL_MS` - TTL in milliseconds (default: 600000)
    /// - `CACHE_SLIDING` - `true` for access-refreshed TTL (default: false)
    /// - `CACHE_SWEEP_PERIOD_MS` - Reaper period in milliseconds (default: 25)
    ///
    /// Values that fail to parse fall back to their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env_or("CACHE_CAPACITY", defaults.capacity),
            ttl_ms: env_or("CACHE_TTL_MS", defaults.ttl_ms),
            sliding: env_or("CACHE_SLIDING", defaults.sliding),
            sweep_period_ms: env_or("CACHE_SWEEP_PERIOD_MS", defaults.sweep_period_ms),
        }
    }

    /// Applies the same rules the cache constructors enforce.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfiguration(
                "capacity must be at least 1".to_string(),
            ));
        }
        validate_ttl(self.ttl())?;
        if self.sweep_period_ms == 0 {
            return Err(CacheError::InvalidConfiguration(
                "sweep period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms)
    }

    /// Cache options on the system clock with the configured reaper period.
    pub fn options(&self) -> CacheOptions {
        CacheOptions::new().with_sweep_period(self.sweep_period())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl_ms: DEFAULT_TTL.as_millis() as u64,
            sliding: false,
            sweep_period_ms: DEFAULT_SWEEP_PERIOD_MS,
        }
    }
}
