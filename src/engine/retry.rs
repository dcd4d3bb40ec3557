//! Conflict retry for single mutating calls.
//!
//! The conflicts this heals are caused by the control plane's own background
//! processing (a build still running, a deletion still draining), not by
//! concurrent writers, so the loop simply waits out the plane at a fixed
//! cadence.

use std::thread;
use std::time::Duration;

use crate::engine::EngineError;
use crate::plane::PlaneError;

/// Fixed pause between conflict retries.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Policy for retrying mutations rejected with [`PlaneError::Conflict`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Upper bound on attempts. `None` retries until the conflict clears,
    /// which is what deployments rely on.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: RETRY_DELAY,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

/// Run `op`, retrying as long as it fails with a conflict.
///
/// Any other error is fatal and propagates on first occurrence. Every
/// attempt re-issues the full request, so the underlying mutation must be
/// keyed by resource name or otherwise safe to repeat.
pub fn run_with_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Result<T, PlaneError>,
) -> Result<T, EngineError> {
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(PlaneError::Conflict(message)) => {
                if let Some(max) = policy.max_attempts {
                    if attempts >= max {
                        return Err(EngineError::RetriesExhausted { attempts, message });
                    }
                }
                tracing::info!(attempts, %message, "conflict reported; retrying");
                thread::sleep(policy.delay);
            }
            Err(err) => return Err(err.into()),
        }
    }
}
