use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

use crate::stage::Schedule;

/// How the VU target moves inside a stage.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RampPolicy {
    /// Interpolate from the previous stage's target to this stage's target.
    #[default]
    Linear,
    /// Jump to the stage's target as soon as the stage begins.
    Step,
}

/// Target concurrency as a function of time since the run started.
#[derive(Debug, Clone)]
pub struct Ramp {
    schedule: Schedule,
    policy: RampPolicy,
}

impl Ramp {
    pub fn new(schedule: Schedule, policy: RampPolicy) -> Self {
        Self { schedule, policy }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn policy(&self) -> RampPolicy {
        self.policy
    }

    pub fn total_duration(&self) -> Duration {
        self.schedule.total_duration()
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    /// VU target at `elapsed`.
    ///
    /// Linear ramps truncate toward the previous level, so a ramp up rounds
    /// down and a ramp down rounds up. Every stage boundary lands exactly on
    /// that stage's target. Past the end, the last target holds.
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        let mut level = 0;
        let mut stage_start = Duration::ZERO;
        for stage in self.schedule.stages() {
            let stage_end = stage_start.saturating_add(stage.duration);
            if elapsed < stage_end {
                return match self.policy {
                    RampPolicy::Step => stage.target,
                    RampPolicy::Linear => interpolate(
                        level,
                        stage.target,
                        elapsed - stage_start,
                        stage.duration,
                    ),
                };
            }
            level = stage.target;
            stage_start = stage_end;
        }
        level
    }
}

fn interpolate(from: u32, to: u32, progress: Duration, span: Duration) -> u32 {
    // `progress < span`, so span is never zero here
    let delta = i128::from(to) - i128::from(from);
    let moved = delta * progress.as_nanos() as i128 / span.as_nanos() as i128;
    (i128::from(from) + moved) as u32
}
