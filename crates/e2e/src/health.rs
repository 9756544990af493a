//! Health preflight against the platform before any workflow runs

use std::time::Duration;

use tracing::{info, warn};

use crate::client::{ApiClient, HttpMethod};
use crate::error::{E2eError, E2eResult};
use crate::poller::{AsyncJobPoller, PollConfig};

const HEALTHY: &str = "HEALTHY";

/// Wait for `path` to answer with a 2xx status
pub async fn wait_for_healthy(
    client: &dyn ApiClient,
    path: &str,
    timeout: Duration,
) -> E2eResult<()> {
    let poller = AsyncJobPoller::new(PollConfig {
        interval: Duration::from_millis(250),
        timeout,
        fetch_retries: 0,
        retry_delay: Duration::ZERO,
    });

    let healthy = [HEALTHY];
    let no_failures: [&str; 0] = [];

    info!("Waiting for platform health at {}", path);
    let result = poller
        .poll_until_terminal(|| probe(client, path), &healthy[..], &no_failures[..])
        .await;

    if result.terminal {
        info!("Platform is healthy ({} ms)", result.elapsed_ms);
        Ok(())
    } else {
        warn!(
            "Health check gave up after {} attempts (last status {:?}, last error {:?})",
            result.attempts, result.status, result.last_error
        );
        Err(E2eError::ServerHealthCheck(result.attempts))
    }
}

async fn probe(client: &dyn ApiClient, path: &str) -> E2eResult<String> {
    let response = client.request(HttpMethod::Get, path, None, None).await?;
    if response.is_success() {
        Ok(HEALTHY.to_string())
    } else {
        Ok(format!("HTTP {}", response.status_code))
    }
}
