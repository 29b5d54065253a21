//! Wall-clock budget for a training run

use crate::error::TrainingError;
use std::time::{Duration, Instant};

/// Point in time after which fitting stops
///
/// Checked between folds, between trees and between Newton steps, so a
/// run overshoots its budget by at most one tree or one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
    budget_secs: u64,
}

impl Deadline {
    /// Expire `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
            budget_secs: budget.as_secs(),
        }
    }

    /// Never expires
    pub fn none() -> Self {
        Self {
            at: None,
            budget_secs: 0,
        }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// `Timeout` once the deadline has passed
    pub fn check(&self) -> Result<(), TrainingError> {
        if self.expired() {
            Err(TrainingError::Timeout(self.budget_secs))
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
