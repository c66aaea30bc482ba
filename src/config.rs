//! Engine configuration.
//!
//! Every struct carries the observed production defaults and can be
//! overridden from the environment.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Retry behaviour for calls to external collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps, for tests and offline providers.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Tuning for the clustering, sequencing and scheduling steps.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Seats per vehicle.
    pub max_per_vehicle: usize,
    /// How long before pickup a rider must be ready, in minutes.
    pub ready_buffer_minutes: i64,
    /// Largest stop count solved by exhaustive search.
    pub exact_search_limit: usize,
    pub kmeans_max_iterations: usize,
    /// Centroid movement (degrees) below which k-means stops.
    pub kmeans_epsilon: f64,
    /// Seed k-means with the spread-based vehicle estimate instead of the
    /// minimum vehicle count.
    pub use_recommended_count: bool,
    /// Rest time stamped on planned routes, in minutes.
    pub rest_minutes: i64,
    pub retry: RetryPolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_per_vehicle: 4,
            ready_buffer_minutes: 5,
            exact_search_limit: 8,
            kmeans_max_iterations: 100,
            kmeans_epsilon: 1e-4,
            use_recommended_count: true,
            rest_minutes: 15,
            retry: RetryPolicy::default(),
        }
    }
}

impl PlannerConfig {
    /// Loads `RIDE_PLANNER_*` overrides on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_per_vehicle: env_or("RIDE_PLANNER_MAX_PER_VEHICLE", defaults.max_per_vehicle)?,
            ready_buffer_minutes: env_or(
                "RIDE_PLANNER_READY_BUFFER_MINUTES",
                defaults.ready_buffer_minutes,
            )?,
            exact_search_limit: env_or(
                "RIDE_PLANNER_EXACT_SEARCH_LIMIT",
                defaults.exact_search_limit,
            )?,
            kmeans_max_iterations: env_or(
                "RIDE_PLANNER_KMEANS_MAX_ITERATIONS",
                defaults.kmeans_max_iterations,
            )?,
            kmeans_epsilon: env_or("RIDE_PLANNER_KMEANS_EPSILON", defaults.kmeans_epsilon)?,
            use_recommended_count: env_or(
                "RIDE_PLANNER_USE_RECOMMENDED_COUNT",
                defaults.use_recommended_count,
            )?,
            rest_minutes: env_or("RIDE_PLANNER_REST_MINUTES", defaults.rest_minutes)?,
            retry: RetryPolicy {
                max_attempts: env_or("RIDE_PLANNER_RETRY_ATTEMPTS", defaults.retry.max_attempts)?,
                base_delay: Duration::from_millis(env_or(
                    "RIDE_PLANNER_RETRY_DELAY_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )?),
            },
        })
    }
}

/// Settings for the driver assignment queue.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Pending jobs the queue holds before submitters wait for room.
    pub queue_capacity: usize,
    /// How long a caller waits for its job before giving up. `None` waits forever.
    pub queue_wait: Option<Duration>,
    /// Rest time applied when a route does not specify one, in minutes.
    pub default_rest_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            queue_wait: Some(Duration::from_secs(30)),
            default_rest_minutes: 15,
        }
    }
}

impl SchedulerConfig {
    /// Loads `RIDE_PLANNER_QUEUE_*` overrides. A wait of `0` disables the bound.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let wait_secs: u64 = env_or(
            "RIDE_PLANNER_QUEUE_WAIT_SECS",
            defaults.queue_wait.map_or(0, |wait| wait.as_secs()),
        )?;
        Ok(Self {
            queue_capacity: env_or("RIDE_PLANNER_QUEUE_CAPACITY", defaults.queue_capacity)?,
            queue_wait: (wait_secs > 0).then(|| Duration::from_secs(wait_secs)),
            default_rest_minutes: env_or(
                "RIDE_PLANNER_DEFAULT_REST_MINUTES",
                defaults.default_rest_minutes,
            )?,
        })
    }
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

/// Reads a string override, falling back to `default`.
pub(crate) fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = PlannerConfig::default();
        assert_eq!(config.max_per_vehicle, 4);
        assert_eq!(config.ready_buffer_minutes, 5);
        assert_eq!(config.exact_search_limit, 8);
        assert_eq!(config.rest_minutes, 15);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_retry_delay_grows() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::from_millis(500));
        assert_eq!(policy.delay_before(2), Duration::from_millis(1000));
        assert_eq!(RetryPolicy::immediate(3).delay_before(2), Duration::ZERO);
    }

    #[test]
    fn test_env_or_parses_and_rejects() {
        // Keys are unique to this test so parallel tests cannot interfere.
        unsafe {
            std::env::set_var("RIDE_PLANNER_TEST_GOOD", "7");
            std::env::set_var("RIDE_PLANNER_TEST_BAD", "seven");
        }
        assert_eq!(env_or("RIDE_PLANNER_TEST_GOOD", 1usize).unwrap(), 7);
        assert_eq!(env_or("RIDE_PLANNER_TEST_MISSING", 1usize).unwrap(), 1);
        let err = env_or("RIDE_PLANNER_TEST_BAD", 1usize).unwrap_err();
        assert_eq!(err.key, "RIDE_PLANNER_TEST_BAD");
    }
}
