use reqwest::header::{HeaderMap, HeaderValue, LOCATION, USER_AGENT};
use reqwest::{redirect, StatusCode};
use std::time::{Duration, Instant};

use crate::error::{BenchError, BenchResult};

/// Redirect service the driver targets unless configured otherwise.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8765/";

/// Path fragment used when `URL_ALIAS` is not set.
pub const UNSET_ALIAS: &str = "undefined";

/// Literal concatenation of `base` and the alias. Nothing is validated or
/// escaped, and no separator is inserted.
pub fn request_url(base: &str, alias: Option<&str>) -> String {
    format!("{base}{}", alias.unwrap_or(UNSET_ALIAS))
}

/// What a single GET observed.
#[derive(Debug, Clone)]
pub struct Probe {
    pub status: StatusCode,
    pub location: Option<String>,
    pub latency: Duration,
}

/// HTTP client that never follows redirects, so 3xx statuses reach the caller.
#[derive(Clone)]
pub struct RedirectClient {
    client: reqwest::Client,
}

impl RedirectClient {
    pub fn new(timeout: Duration) -> BenchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("redirect-bench/0.1"));
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(BenchError::Client)?;
        Ok(Self { client })
    }

    /// One blocking GET for the calling VU. The body is drained so the
    /// connection can go back to the pool; latency covers the whole exchange.
    pub async fn get(&self, url: &str) -> BenchResult<Probe> {
        let started = Instant::now();
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| request_error(url, source))?;
        let status = resp.status();
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        resp.bytes()
            .await
            .map_err(|source| request_error(url, source))?;
        Ok(Probe {
            status,
            location,
            latency: started.elapsed(),
        })
    }
}

fn request_error(url: &str, source: reqwest::Error) -> BenchError {
    BenchError::Request {
        url: url.to_owned(),
        source,
    }
}
