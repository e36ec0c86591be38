use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::check::STATUS_IS_308;
use crate::client::RedirectClient;
use crate::error::BenchResult;
use crate::metrics::Metrics;

/// The body of a virtual user's loop.
///
/// An `Err` is counted as a failed iteration and the VU carries on; failed
/// checks belong in `metrics.checks` and are not errors.
#[async_trait]
pub trait Scenario: Send + Sync {
    async fn iteration(&self, vu: u32, metrics: &Metrics) -> BenchResult<()>;
}

/// GET the short URL and check it answers with a permanent redirect.
pub struct RedirectScenario {
    client: RedirectClient,
    url: String,
}

impl RedirectScenario {
    pub fn new(client: RedirectClient, url: String) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Scenario for RedirectScenario {
    async fn iteration(&self, vu: u32, metrics: &Metrics) -> BenchResult<()> {
        let response = self.client.get(&self.url).await?;
        metrics.record_request(response.latency);
        let passed = metrics
            .checks
            .record(STATUS_IS_308, response.status == StatusCode::PERMANENT_REDIRECT);
        if !passed {
            debug!(
                vu,
                status = response.status.as_u16(),
                location = response.location.as_deref().unwrap_or(""),
                "redirect check failed"
            );
        }
        Ok(())
    }
}
