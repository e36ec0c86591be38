use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Check evaluated on every redirect iteration.
pub const STATUS_IS_308: &str = "status is 308";

/// Pass/fail tally for one named check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckTally {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Fraction of evaluations that passed; 0.0 when never evaluated.
    pub fn pass_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.passes as f64 / n as f64,
        }
    }
}

/// Named boolean checks shared by every virtual user.
#[derive(Debug, Default)]
pub struct Checks {
    tallies: Mutex<BTreeMap<String, (u64, u64)>>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outcome and hands it back so callers can branch on it.
    pub fn record(&self, name: &str, passed: bool) -> bool {
        let mut tallies = self.tallies.lock();
        let entry = tallies.entry(name.to_owned()).or_default();
        if passed {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
        passed
    }

    pub fn snapshot(&self) -> Vec<CheckTally> {
        self.tallies
            .lock()
            .iter()
            .map(|(name, (passes, fails))| CheckTally {
                name: name.clone(),
                passes: *passes,
                fails: *fails,
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<CheckTally> {
        self.tallies.lock().get(name).map(|(passes, fails)| CheckTally {
            name: name.to_owned(),
            passes: *passes,
            fails: *fails,
        })
    }
}
