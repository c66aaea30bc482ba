//! Blocking retry with linearly increasing backoff for external calls.

use std::fmt::Display;

use tracing::warn;

use crate::config::RetryPolicy;

/// Runs `call` until it succeeds or the policy's attempts are used up.
///
/// Returns the last error when every attempt failed. A policy with zero
/// attempts still makes one call.
pub fn with_retry<T, E, F>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                let delay = policy.delay_before(attempt);
                warn!(operation, attempt, error = %err, ?delay, "external call failed, retrying");
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(err) => {
                warn!(operation, attempt, error = %err, "external call failed, giving up");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeds_after_failures() {
        let mut calls = 0;
        let result: Result<u32, String> = with_retry(&RetryPolicy::immediate(3), "test", || {
            calls += 1;
            if calls < 3 { Err(format!("fail {}", calls)) } else { Ok(calls) }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_gives_up_with_last_error() {
        let mut calls = 0;
        let result: Result<(), String> = with_retry(&RetryPolicy::immediate(3), "test", || {
            calls += 1;
            Err(format!("fail {}", calls))
        });
        assert_eq!(result, Err("fail 3".to_string()));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_zero_attempts_still_calls_once() {
        let mut calls = 0;
        let _: Result<(), &str> = with_retry(&RetryPolicy::immediate(0), "test", || {
            calls += 1;
            Err("nope")
        });
        assert_eq!(calls, 1);
    }
}
