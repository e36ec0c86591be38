//! Staged load driver for URL shortener redirect endpoints.
//!
//! A [`LoadDriver`] plays a [`Schedule`] of ramp stages against a
//! [`Scenario`]; the stock [`RedirectScenario`] GETs one short URL with
//! redirects disabled and checks for `308 Permanent Redirect`.

pub mod check;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod ramp;
pub mod scenario;
pub mod stage;
pub mod summary;
pub mod telemetry;

pub use check::{CheckTally, Checks, STATUS_IS_308};
pub use client::{request_url, RedirectClient};
pub use config::Config;
pub use driver::{DriverOptions, LoadDriver};
pub use error::{BenchError, BenchResult};
pub use ramp::{Ramp, RampPolicy};
pub use scenario::{RedirectScenario, Scenario};
pub use stage::{Schedule, Stage};
pub use summary::RunSummary;
