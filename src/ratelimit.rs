//! Per-agent sliding-window rate limiting for engine calls.
//!
//! The limiter never drops a call; it only delays admission until the
//! oldest call in the window ages out, so every admitted request is
//! eventually served. Admission and recording happen under one lock, so
//! concurrent callers can never overshoot the window.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Rate limiting knobs, loaded from the `[rate_limit]` config section.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum calls per agent inside one window.
    pub calls_per_window: usize,
    /// Window width.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls_per_window: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Snapshot of one agent's admission state.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub calls_in_window: usize,
    pub max_calls: usize,
    pub throttled: bool,
    /// Estimated wait until the next admission, in milliseconds.
    pub wait_ms: u64,
}

/// Sliding-window admission control, one window per agent.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Suspend the caller until the agent may place another call, and
    /// record the call in the same critical section.
    pub async fn admit(&self, agent_name: &str) {
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let window = windows.entry(agent_name.to_string()).or_default();
                Self::prune(window, self.config.window);

                if window.len() < self.config.calls_per_window {
                    window.push_back(Instant::now());
                    return;
                }

                // Oldest call plus the window width is the next admission point.
                let oldest = *window.front().expect("window is non-empty");
                self.config
                    .window
                    .saturating_sub(oldest.elapsed())
                    .max(Duration::from_millis(10))
            };

            debug!(
                "Rate limit reached for {}; waiting {:?}",
                agent_name, wait
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Current admission state for the agent.
    pub async fn status(&self, agent_name: &str) -> RateLimitStatus {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(agent_name.to_string()).or_default();
        Self::prune(window, self.config.window);

        let calls_in_window = window.len();
        let throttled = calls_in_window >= self.config.calls_per_window;
        let wait_ms = if throttled {
            window
                .front()
                .map(|oldest| {
                    self.config
                        .window
                        .saturating_sub(oldest.elapsed())
                        .as_millis() as u64
                })
                .unwrap_or(0)
        } else {
            0
        };

        RateLimitStatus {
            calls_in_window,
            max_calls: self.config.calls_per_window,
            throttled,
            wait_ms,
        }
    }

    fn prune(window: &mut VecDeque<Instant>, width: Duration) {
        while let Some(oldest) = window.front() {
            if oldest.elapsed() >= width {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
