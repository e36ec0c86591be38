use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, path::Path, time::Duration};
use uuid::Uuid;

use crate::check::CheckTally;
use crate::error::{BenchError, BenchResult};
use crate::metrics::{Counters, LatencyStats, Metrics};

/// End-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Set when a shutdown signal cut the schedule short.
    pub stopped_early: bool,
    pub counters: Counters,
    pub checks: Vec<CheckTally>,
    pub http_req_duration: LatencyStats,
}

impl RunSummary {
    pub fn collect(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        duration: Duration,
        stopped_early: bool,
        metrics: &Metrics,
    ) -> Self {
        Self {
            run_id,
            started_at,
            duration,
            stopped_early,
            counters: metrics.counters(),
            checks: metrics.checks.snapshot(),
            http_req_duration: metrics.latency_stats(),
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckTally> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn checks_passed(&self) -> u64 {
        self.checks.iter().map(|c| c.passes).sum()
    }

    pub fn checks_failed(&self) -> u64 {
        self.checks.iter().map(|c| c.fails).sum()
    }

    /// Share of all check evaluations that passed; 0.0 if none ran.
    pub fn check_pass_ratio(&self) -> f64 {
        let total = self.checks_passed() + self.checks_failed();
        if total == 0 {
            return 0.0;
        }
        self.checks_passed() as f64 / total as f64
    }

    pub async fn export(&self, path: &Path) -> BenchResult<()> {
        let body =
            serde_json::to_vec_pretty(self).map_err(|e| BenchError::Export(e.to_string()))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| BenchError::Export(format!("{}: {e}", dir.display())))?;
        }
        tokio::fs::write(path, body)
            .await
            .map_err(|e| BenchError::Export(format!("{}: {e}", path.display())))
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counters;
        let lat = &self.http_req_duration;
        let early = if self.stopped_early { ", stopped early" } else { "" };
        writeln!(f, "run {} ({:.1}s{early})", self.run_id, self.duration.as_secs_f64())?;
        for check in &self.checks {
            let mark = if check.fails == 0 { '✓' } else { '✗' };
            writeln!(
                f,
                "  {mark} {:<28} {:>6.2}%  ✓ {}  ✗ {}",
                check.name,
                check.pass_ratio() * 100.0,
                check.passes,
                check.fails
            )?;
        }
        writeln!(
            f,
            "  {:<30} {:>6.2}%  ✓ {}  ✗ {}",
            "checks",
            self.check_pass_ratio() * 100.0,
            self.checks_passed(),
            self.checks_failed()
        )?;
        writeln!(
            f,
            "  {:<30} avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
            "http_req_duration",
            lat.avg_ms,
            lat.min_ms,
            lat.med_ms,
            lat.max_ms,
            lat.p90_ms,
            lat.p95_ms
        )?;
        writeln!(f, "  {:<30} {}", "http_reqs", c.requests)?;
        writeln!(
            f,
            "  {:<30} {} (failed {}, interrupted {})",
            "iterations", c.iterations, c.failed_iterations, c.interrupted_iterations
        )?;
        write!(f, "  {:<30} {}", "vus_max", c.peak_vus)
    }
}
