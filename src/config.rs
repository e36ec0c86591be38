use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, time::Duration};

use crate::client::{request_url, DEFAULT_BASE_URL};
use crate::driver::DriverOptions;
use crate::error::{BenchError, BenchResult};
use crate::ramp::RampPolicy;
use crate::stage::{Schedule, MAX_SCHEDULE_DURATION};

pub const DEFAULT_CONFIG_PATH: &str = "config/bench.toml";
pub const CONFIG_PATH_VAR: &str = "BENCH_CONFIG";
pub const URL_ALIAS_VAR: &str = "URL_ALIAS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub load: LoadConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub base_url: String,
    /// Path fragment appended to `base_url`, normally taken from `URL_ALIAS`.
    pub alias: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            alias: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub stages: Schedule,
    pub ramp: RampPolicy,
    /// How often the ramp controller re-evaluates the VU target.
    #[serde(with = "humantime_serde")]
    pub tick: Duration,
    /// How long in-flight iterations may run once the schedule is over.
    #[serde(with = "humantime_serde")]
    pub graceful_stop: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            stages: Schedule::default(),
            ramp: RampPolicy::Linear,
            tick: Duration::from_secs(1),
            graceful_stop: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Write the end-of-run summary as JSON here.
    pub export_path: Option<PathBuf>,
}

impl Config {
    /// Defaults, then the TOML file named by `BENCH_CONFIG`, then `BENCH__*`
    /// variables, then `URL_ALIAS`.
    pub fn load() -> BenchResult<Self> {
        // a missing .env is fine
        let _ = dotenvy::dotenv();
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let figment = Self::figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BENCH__").split("__"));
        Self::from_figment(figment, env::var(URL_ALIAS_VAR).ok())
    }

    /// Figment seeded with the built-in defaults.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    /// `url_alias` is injected as-is: an empty string stays empty and no
    /// value at all leaves whatever the providers set.
    pub fn from_figment(figment: Figment, url_alias: Option<String>) -> BenchResult<Self> {
        let mut cfg: Config = figment.extract()?;
        if url_alias.is_some() {
            cfg.target.alias = url_alias;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> BenchResult<()> {
        if self.load.tick.is_zero() {
            return Err(BenchError::Config("load.tick must be greater than zero".into()));
        }
        if self.target.timeout.is_zero() {
            return Err(BenchError::Config(
                "target.timeout must be greater than zero".into(),
            ));
        }
        match self.load.stages.checked_total_duration() {
            Some(total) if total <= MAX_SCHEDULE_DURATION => Ok(()),
            _ => Err(BenchError::Config(
                "load.stages must add up to at most 30 days".into(),
            )),
        }
    }

    pub fn request_url(&self) -> String {
        request_url(&self.target.base_url, self.target.alias.as_deref())
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            policy: self.load.ramp,
            tick: self.load.tick,
            graceful_stop: self.load.graceful_stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    #[test]
    fn test_defaults_match_redirect_benchmark() {
        let cfg = Config::from_figment(Config::figment(), None).unwrap();
        assert_eq!(cfg.load.stages, Schedule::default());
        assert_eq!(cfg.load.ramp, RampPolicy::Linear);
        assert_eq!(cfg.load.tick, Duration::from_secs(1));
        assert_eq!(cfg.request_url(), "http://127.0.0.1:8765/undefined");
        assert!(cfg.summary.export_path.is_none());
    }

    #[test]
    fn test_url_alias_is_injected_verbatim() {
        let cfg = Config::from_figment(Config::figment(), Some("foo".into())).unwrap();
        assert_eq!(cfg.request_url(), "http://127.0.0.1:8765/foo");

        let cfg = Config::from_figment(Config::figment(), Some(String::new())).unwrap();
        assert_eq!(cfg.request_url(), "http://127.0.0.1:8765/");
    }

    #[test]
    fn test_toml_overrides_stages_and_target() {
        let toml = r#"
            [target]
            base_url = "http://localhost:9000/r/"
            timeout = "5s"

            [load]
            ramp = "step"
            tick = "250ms"
            stages = [
                { target = 2, duration = "10s" },
                { target = 0, duration = "5s" },
            ]

            [summary]
            export_path = "out/summary.json"
        "#;
        let figment = Config::figment().merge(Toml::string(toml));
        let cfg = Config::from_figment(figment, Some("abc".into())).unwrap();

        assert_eq!(cfg.request_url(), "http://localhost:9000/r/abc");
        assert_eq!(cfg.target.timeout, Duration::from_secs(5));
        assert_eq!(
            cfg.load.stages.stages(),
            &[
                Stage::new(2, Duration::from_secs(10)),
                Stage::new(0, Duration::from_secs(5)),
            ]
        );
        let opts = cfg.driver_options();
        assert_eq!(opts.policy, RampPolicy::Step);
        assert_eq!(opts.tick, Duration::from_millis(250));
        assert_eq!(opts.graceful_stop, Duration::from_secs(30));
        assert_eq!(
            cfg.summary.export_path,
            Some(PathBuf::from("out/summary.json"))
        );
    }

    #[test]
    fn test_zero_tick_is_rejected() {
        let figment = Config::figment().merge(Toml::string("[load]\ntick = \"0s\""));
        let err = Config::from_figment(figment, None).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_overflowing_stage_total_is_rejected() {
        let toml = r#"
            [load]
            stages = [
                { target = 1, duration = "18446744073709551615s" },
                { target = 0, duration = "1s" },
            ]
        "#;
        let figment = Config::figment().merge(Toml::string(toml));
        let err = Config::from_figment(figment, None).unwrap_err();
        assert!(matches!(err, BenchError::Config(ref msg) if msg.contains("load.stages")));
    }

    #[test]
    fn test_schedule_longer_than_cap_is_rejected() {
        let figment = Config::figment().merge(Toml::string(
            "[load]\nstages = [{ target = 1, duration = \"31days\" }]",
        ));
        assert!(matches!(
            Config::from_figment(figment, None),
            Err(BenchError::Config(_))
        ));

        let figment = Config::figment().merge(Toml::string(
            "[load]\nstages = [{ target = 1, duration = \"30days\" }]",
        ));
        assert!(Config::from_figment(figment, None).is_ok());
    }

    #[test]
    fn test_shipped_settings_file_parses_to_defaults() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        assert!(path.exists(), "{} is missing", path.display());

        let figment = Config::figment().merge(Toml::file(&path));
        let cfg = Config::from_figment(figment, None).unwrap();
        let defaults = Config::default();
        assert_eq!(cfg.load.stages, Schedule::default());
        assert_eq!(cfg.load.ramp, defaults.load.ramp);
        assert_eq!(cfg.load.tick, defaults.load.tick);
        assert_eq!(cfg.load.graceful_stop, defaults.load.graceful_stop);
        assert_eq!(cfg.target.base_url, defaults.target.base_url);
        assert_eq!(cfg.target.timeout, defaults.target.timeout);
        assert!(cfg.summary.export_path.is_none());
    }

    #[test]
    fn test_malformed_duration_is_config_error() {
        let figment = Config::figment().merge(Toml::string("[target]\ntimeout = \"soon\""));
        let err = Config::from_figment(figment, None).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }
}
