//! Runtime configuration for the search engine.
//!
//! # Environment Variables
//!
//! - `STARGAZER_CACHE_TTL_SECS`: cache entry lifetime (default: 1800)
//! - `STARGAZER_CACHE_CAPACITY`: maximum cached result sets (default: 128)
//! - `STARGAZER_SWEEP_INTERVAL_SECS`: background expiry sweep, 0 disables (default: 60)
//! - `STARGAZER_CANCEL_ORPHANED`: abort computations nobody waits for (default: false)
//! - `STARGAZER_MAX_PAGE_SIZE`: largest accepted page size (default: 100)
//! - `STARGAZER_COMPUTE_TIMEOUT_SECS`: deadline for one pipeline run (default: 120)
//! - `STARGAZER_UPSTREAM_TIMEOUT_SECS`: per-call HTTP timeout (default: 10)
//! - `STARGAZER_RETRY_ATTEMPTS`: attempts per upstream call (default: 3)
//! - `STARGAZER_RETRY_BACKOFF_MS`: initial retry backoff (default: 200)
//! - `STARGAZER_GRID_RESOLUTION_DEG`: terrain sampling step (default: 0.001)
//! - `STARGAZER_RELIEF_WINDOW`: relief neighbourhood half-width (default: 3)
//!
//! Unparseable values fall back to the default and log a warning.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::retry::RetryPolicy;

/// Finest accepted terrain step, roughly 1 cm at the equator.
pub const MIN_RESOLUTION_DEG: f64 = 1e-7;

/// Terrain scanner tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainConfig {
    /// Grid step in degrees.
    pub resolution_deg: f64,
    /// Half-width of the relief neighbourhood, in cells.
    pub relief_window: usize,
    /// Upper bound on sampled cells; the grid is coarsened to fit.
    pub max_cells: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            resolution_deg: 0.001,
            relief_window: 3,
            max_cells: 250_000,
        }
    }
}

/// Result cache tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
    /// Period of the background expiry sweep. `None` disables the sweeper.
    pub sweep_interval: Option<Duration>,
    /// Abort a computation once every caller waiting on it has gone away.
    pub cancel_orphaned: bool,
    /// Deadline for one pipeline run.
    pub compute_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            capacity: 128,
            sweep_interval: Some(Duration::from_secs(60)),
            cancel_orphaned: false,
            compute_timeout: Duration::from_secs(120),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub terrain: TerrainConfig,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
    /// Per-call timeout for remote data sources.
    pub upstream_timeout: Duration,
    pub max_page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            upstream_timeout: Duration::from_secs(10),
            max_page_size: 100,
        }
    }
}

impl SearchConfig {
    /// Create configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = EnvReader { lookup };

        let sweep_secs = env.parse(
            "STARGAZER_SWEEP_INTERVAL_SECS",
            defaults
                .cache
                .sweep_interval
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );

        let resolution_deg = env.parse(
            "STARGAZER_GRID_RESOLUTION_DEG",
            defaults.terrain.resolution_deg,
        );
        let resolution_deg =
            if resolution_deg.is_finite() && resolution_deg >= MIN_RESOLUTION_DEG {
                resolution_deg
            } else {
                warn!(
                    value = resolution_deg,
                    min = MIN_RESOLUTION_DEG,
                    "STARGAZER_GRID_RESOLUTION_DEG out of range, using default"
                );
                defaults.terrain.resolution_deg
            };

        Self {
            terrain: TerrainConfig {
                resolution_deg,
                relief_window: env
                    .parse("STARGAZER_RELIEF_WINDOW", defaults.terrain.relief_window)
                    .max(1),
                max_cells: defaults.terrain.max_cells,
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(env.parse(
                    "STARGAZER_CACHE_TTL_SECS",
                    defaults.cache.ttl.as_secs(),
                )),
                capacity: env
                    .parse("STARGAZER_CACHE_CAPACITY", defaults.cache.capacity)
                    .max(1),
                sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
                cancel_orphaned: env
                    .parse("STARGAZER_CANCEL_ORPHANED", defaults.cache.cancel_orphaned),
                compute_timeout: Duration::from_secs(
                    env.parse(
                        "STARGAZER_COMPUTE_TIMEOUT_SECS",
                        defaults.cache.compute_timeout.as_secs(),
                    )
                    .max(1),
                ),
            },
            retry: RetryPolicy {
                max_attempts: env
                    .parse("STARGAZER_RETRY_ATTEMPTS", defaults.retry.max_attempts)
                    .max(1),
                initial_backoff: Duration::from_millis(env.parse(
                    "STARGAZER_RETRY_BACKOFF_MS",
                    defaults.retry.initial_backoff.as_millis() as u64,
                )),
                max_backoff: defaults.retry.max_backoff,
            },
            upstream_timeout: Duration::from_secs(
                env.parse(
                    "STARGAZER_UPSTREAM_TIMEOUT_SECS",
                    defaults.upstream_timeout.as_secs(),
                )
                .max(1),
            ),
            max_page_size: env
                .parse("STARGAZER_MAX_PAGE_SIZE", defaults.max_page_size)
                .max(1),
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + Copy,
    {
        match (self.lookup)(key) {
            None => default,
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => value,
                Err(_) => {
                    warn!(key, value = %raw, "ignoring unparseable configuration value");
                    default
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> SearchConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SearchConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(from_pairs(&[]), SearchConfig::default());
    }

    #[test]
    fn values_are_read() {
        let config = from_pairs(&[
            ("STARGAZER_CACHE_TTL_SECS", "60"),
            ("STARGAZER_CACHE_CAPACITY", "4"),
            ("STARGAZER_SWEEP_INTERVAL_SECS", "0"),
            ("STARGAZER_CANCEL_ORPHANED", "true"),
            ("STARGAZER_MAX_PAGE_SIZE", "25"),
            ("STARGAZER_RETRY_ATTEMPTS", "5"),
            ("STARGAZER_GRID_RESOLUTION_DEG", "0.002"),
        ]);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.capacity, 4);
        assert_eq!(config.cache.sweep_interval, None);
        assert!(config.cache.cancel_orphaned);
        assert_eq!(config.max_page_size, 25);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.terrain.resolution_deg, 0.002);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = from_pairs(&[
            ("STARGAZER_CACHE_CAPACITY", "lots"),
            ("STARGAZER_GRID_RESOLUTION_DEG", "-1"),
            ("STARGAZER_MAX_PAGE_SIZE", "0"),
        ]);
        assert_eq!(config.cache.capacity, 128);
        assert_eq!(config.terrain.resolution_deg, 0.001);
        assert_eq!(config.max_page_size, 1);
    }

    #[test]
    fn vanishing_grid_resolution_falls_back_to_default() {
        for value in ["1e-300", "0", "NaN", "inf"] {
            let config = from_pairs(&[("STARGAZER_GRID_RESOLUTION_DEG", value)]);
            assert_eq!(config.terrain.resolution_deg, 0.001, "{}", value);
        }
    }
}
