use thiserror::Error;

/// Errors surfaced by the load driver.
///
/// Only `Config`, `Client` and `Export` stop the binary. `Request` is what a
/// single iteration reports back to the worker pool, which counts it and moves on.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Summary export failed: {0}")]
    Export(String),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<figment::Error> for BenchError {
    fn from(err: figment::Error) -> Self {
        BenchError::Config(err.to_string())
    }
}

impl BenchError {
    /// True for failures of a single iteration, which never abort a run.
    pub fn is_iteration_failure(&self) -> bool {
        matches!(self, BenchError::Request { .. })
    }
}

pub type BenchResult<T> = std::result::Result<T, BenchError>;
