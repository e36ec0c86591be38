use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest schedule a run accepts: thirty days.
pub const MAX_SCHEDULE_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// One segment of the ramp: reach `target` VUs over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub target: u32,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl Stage {
    pub const fn new(target: u32, duration: Duration) -> Self {
        Self { target, duration }
    }
}

/// Ordered stages, played once from a level of 0 VUs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    stages: Vec<Stage>,
}

impl Schedule {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Sum of stage durations, saturating at `Duration::MAX`.
    pub fn total_duration(&self) -> Duration {
        self.checked_total_duration().unwrap_or(Duration::MAX)
    }

    /// Sum of stage durations, or `None` if it overflows.
    pub fn checked_total_duration(&self) -> Option<Duration> {
        self.stages
            .iter()
            .try_fold(Duration::ZERO, |acc, s| acc.checked_add(s.duration))
    }

    /// Peak VU count, which bounds the size of the worker pool.
    pub fn max_target(&self) -> u32 {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// Index of the stage running at `elapsed`, or `None` once the schedule is over.
    pub fn stage_index_at(&self, elapsed: Duration) -> Option<usize> {
        let mut end = Duration::ZERO;
        for (i, stage) in self.stages.iter().enumerate() {
            end = end.saturating_add(stage.duration);
            if elapsed < end {
                return Some(i);
            }
        }
        None
    }
}

impl Default for Schedule {
    /// 5 → 15 → 20 → 50 VUs a minute apiece, hold 50 for two minutes, drain to 0.
    fn default() -> Self {
        const MINUTE: Duration = Duration::from_secs(60);
        Self::new(vec![
            Stage::new(5, MINUTE),
            Stage::new(15, MINUTE),
            Stage::new(20, MINUTE),
            Stage::new(50, MINUTE),
            Stage::new(50, MINUTE * 2),
            Stage::new(0, MINUTE),
        ])
    }
}

impl FromIterator<Stage> for Schedule {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
