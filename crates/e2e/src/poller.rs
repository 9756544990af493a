//! Polling of asynchronous jobs until they settle

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::E2eResult;

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait between ticks
    pub interval: Duration,

    /// Wall-clock budget for the whole poll
    pub timeout: Duration,

    /// Extra attempts for a failed fetch within one tick
    pub fetch_retries: u32,

    /// Wait between those extra attempts
    pub retry_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(90),
            fetch_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Outcome of a poll. Running out of time is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    /// Last status observed, if any fetch ever succeeded
    pub status: Option<String>,
    pub elapsed_ms: u64,
    pub terminal: bool,

    /// Terminal because the status is a hard failure
    pub hard_failure: bool,

    /// Ticks performed (a tick is one fetch plus its retries)
    pub attempts: u32,
    pub last_error: Option<String>,
}

pub struct AsyncJobPoller {
    config: PollConfig,
}

impl AsyncJobPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Fetch until a terminal status shows up or the budget runs out.
    ///
    /// The first fetch happens immediately. Hard-failure statuses end the poll
    /// at once, whether or not they are also listed as terminal.
    pub async fn poll_until_terminal<F, Fut, S>(
        &self,
        mut fetch: F,
        terminal_statuses: &[S],
        hard_failure_statuses: &[S],
    ) -> PollResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<String>>,
        S: AsRef<str>,
    {
        let start = Instant::now();
        let deadline = start + self.config.timeout;
        let mut status: Option<String> = None;
        let mut last_error: Option<String> = None;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            match self.fetch_with_retries(&mut fetch, deadline).await {
                Ok(observed) => {
                    last_error = None;
                    debug!("Poll tick {}: status {}", attempts, observed);
                    let hard_failure = contains_status(hard_failure_statuses, &observed);
                    let terminal = hard_failure || contains_status(terminal_statuses, &observed);
                    status = Some(observed);
                    if terminal {
                        return PollResult {
                            status,
                            elapsed_ms: start.elapsed().as_millis() as u64,
                            terminal: true,
                            hard_failure,
                            attempts,
                            last_error,
                        };
                    }
                }
                Err(e) => {
                    warn!("Poll tick {} failed: {}", attempts, e);
                    last_error = Some(e.to_string());
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.config.timeout {
                return PollResult {
                    status,
                    elapsed_ms: elapsed.as_millis() as u64,
                    terminal: false,
                    hard_failure: false,
                    attempts,
                    last_error,
                };
            }

            sleep(self.config.interval.min(self.config.timeout - elapsed)).await;
        }
    }

    /// Retries stay within `deadline`: the last wait is shortened to it and no
    /// retry starts once it has passed.
    async fn fetch_with_retries<F, Fut>(&self, fetch: &mut F, deadline: Instant) -> E2eResult<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<String>>,
    {
        let mut retries_left = self.config.fetch_retries;
        loop {
            match fetch().await {
                Ok(status) => return Ok(status),
                Err(e) if retries_left > 0 && Instant::now() < deadline => {
                    debug!("Fetch failed ({}), {} retries left", e, retries_left);
                    retries_left -= 1;
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    sleep(self.config.retry_delay.min(remaining)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn contains_status<S: AsRef<str>>(statuses: &[S], status: &str) -> bool {
    statuses
        .iter()
        .any(|s| s.as_ref().eq_ignore_ascii_case(status))
}
