use chrono::Utc;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BenchError, BenchResult};
use crate::metrics::Metrics;
use crate::ramp::{Ramp, RampPolicy};
use crate::scenario::Scenario;
use crate::stage::{Schedule, MAX_SCHEDULE_DURATION};
use crate::summary::RunSummary;

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub policy: RampPolicy,
    /// Ramp controller period.
    pub tick: Duration,
    /// Time in-flight iterations get to finish once the schedule ends.
    pub graceful_stop: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            policy: RampPolicy::Linear,
            tick: Duration::from_secs(1),
            graceful_stop: Duration::from_secs(30),
        }
    }
}

/// Runs a [`Scenario`] on a pool of virtual users sized by a [`Ramp`].
///
/// Every tick the ramp target is published on a watch channel. VU `n` runs
/// iterations back to back while the target is above `n` and parks otherwise,
/// so lowering the target lets the highest VUs finish their current iteration
/// and go idle. Workers are spawned lazily and never exceed the schedule's peak.
pub struct LoadDriver<S> {
    scenario: Arc<S>,
    ramp: Ramp,
    options: DriverOptions,
    metrics: Arc<Metrics>,
}

impl<S: Scenario + 'static> LoadDriver<S> {
    pub fn new(scenario: S, schedule: Schedule, options: DriverOptions) -> Self {
        Self {
            scenario: Arc::new(scenario),
            ramp: Ramp::new(schedule, options.policy),
            options,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub async fn run(self) -> BenchResult<RunSummary> {
        self.run_until(std::future::pending()).await
    }

    /// Plays the schedule once, or until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> BenchResult<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let end = self
            .ramp
            .schedule()
            .checked_total_duration()
            .filter(|total| *total <= MAX_SCHEDULE_DURATION)
            .and_then(|total| start.checked_add(total))
            .ok_or_else(|| {
                BenchError::Config("schedule is longer than the driver can run".into())
            })?;
        let total = end - start;
        info!(
            %run_id,
            stages = self.ramp.schedule().stages().len(),
            max_vus = self.ramp.schedule().max_target(),
            total_secs = total.as_secs_f64(),
            policy = %self.ramp.policy(),
            "starting load run"
        );

        let (target_tx, target_rx) = watch::channel(0u32);
        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();
        let mut spawned = 0u32;
        let mut stage = None;
        let mut stopped_early = false;

        let mut ticker = tokio::time::interval(self.options.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = tokio::time::sleep_until(end);
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!(%run_id, elapsed_secs = start.elapsed().as_secs_f64(), "shutdown requested, ending schedule early");
                    stopped_early = true;
                    break;
                }
                _ = &mut deadline => break,
                _ = ticker.tick() => {}
            }

            let elapsed = start.elapsed();
            if self.ramp.is_finished(elapsed) {
                break;
            }

            let current = self.ramp.schedule().stage_index_at(elapsed);
            if current != stage {
                stage = current;
                if let Some(i) = current {
                    let s = self.ramp.schedule().stages()[i];
                    info!(
                        stage = i + 1,
                        target = s.target,
                        duration_secs = s.duration.as_secs_f64(),
                        "entering stage"
                    );
                }
            }

            let target = self.ramp.target_at(elapsed);
            while spawned < target {
                workers.spawn(run_vu(
                    spawned,
                    self.scenario.clone(),
                    self.metrics.clone(),
                    target_rx.clone(),
                    cancel.clone(),
                ));
                spawned += 1;
            }
            if target_tx.send_replace(target) != target {
                debug!(vus = target, "vu target changed");
                self.metrics.observe_vus(target);
            }
        }

        // Park every VU, then close the channel so parked VUs exit.
        target_tx.send_replace(0);
        drop(target_tx);
        drop(target_rx);

        match tokio::time::timeout(self.options.graceful_stop, drain(&mut workers)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    remaining = workers.len(),
                    grace_secs = self.options.graceful_stop.as_secs_f64(),
                    "graceful stop expired, interrupting in-flight iterations"
                );
                cancel.cancel();
                drain(&mut workers).await?;
            }
        }

        let summary = RunSummary::collect(
            run_id,
            started_at,
            start.elapsed(),
            stopped_early,
            &self.metrics,
        );
        info!(
            %run_id,
            iterations = summary.counters.iterations,
            failed_iterations = summary.counters.failed_iterations,
            interrupted_iterations = summary.counters.interrupted_iterations,
            checks_passed = summary.checks_passed(),
            checks_failed = summary.checks_failed(),
            "load run finished"
        );
        Ok(summary)
    }
}

async fn drain(workers: &mut JoinSet<()>) -> BenchResult<()> {
    while let Some(res) = workers.join_next().await {
        res?;
    }
    Ok(())
}

async fn run_vu<S: Scenario>(
    vu: u32,
    scenario: Arc<S>,
    metrics: Arc<Metrics>,
    mut target: watch::Receiver<u32>,
    cancel: CancellationToken,
) {
    loop {
        let active = *target.borrow_and_update() > vu;
        if !active {
            // Err means the schedule is over
            if target.changed().await.is_err() {
                return;
            }
            continue;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                metrics.record_interrupted();
                return;
            }
            outcome = scenario.iteration(vu, &metrics) => match outcome {
                Ok(()) => metrics.record_iteration(true),
                Err(err) => {
                    debug!(vu, error = %err, "iteration failed");
                    metrics.record_iteration(false);
                }
            },
        }
    }
}
