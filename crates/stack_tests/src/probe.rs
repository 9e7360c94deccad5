//! HTTP probe used to check that the notebook server is listening.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::errors::{HarnessError, Result};

/// Pause between connection attempts while the server port is not bound yet.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Response captured by a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub body: String,
}

/// Issues GET requests against a container's published port.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// Request `url` and return the first response received.
    ///
    /// Fails with [`HarnessError::ProbeTimeout`] when nothing answers before
    /// the probe's timeout.
    async fn get(&self, url: &str) -> Result<ProbeResponse>;
}

/// [`HttpProbe`] backed by `reqwest`.
///
/// A response of any status is returned as is; it is never retried. A request
/// that ends without any response is attempted again until the timeout
/// expires: either the connection is refused, or a port proxy accepts it and
/// closes it because the server has not bound its port yet.
pub struct ReqwestProbe {
    client: reqwest::Client,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            poll_interval: POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse> {
        let deadline = Instant::now().checked_add(self.timeout).ok_or_else(|| {
            HarnessError::Config(format!(
                "probe timeout of {}s is out of range",
                self.timeout.as_secs()
            ))
        })?;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HarnessError::ProbeTimeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                });
            }

            match self.client.get(url).timeout(remaining).send().await {
                Ok(response) => {
                    let status_code = response.status().as_u16();
                    let body = response.text().await.map_err(|e| HarnessError::Probe {
                        url: url.to_string(),
                        reason: format!("failed to read response body: {}", e),
                    })?;

                    info!(url = url, status = status_code, attempt = attempt, "Probe answered");
                    return Ok(ProbeResponse { status_code, body });
                }
                Err(e) if e.is_timeout() => {
                    return Err(HarnessError::ProbeTimeout {
                        url: url.to_string(),
                        timeout: self.timeout,
                    });
                }
                Err(e) if is_not_ready(&e) => {
                    debug!(url = url, attempt = attempt, error = %e, "Server not listening yet");
                }
                Err(e) => {
                    return Err(HarnessError::Probe {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

/// Whether a failed request never reached a server able to answer it.
fn is_not_ready(error: &reqwest::Error) -> bool {
    !error.is_builder() && (error.is_connect() || error.is_request())
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
