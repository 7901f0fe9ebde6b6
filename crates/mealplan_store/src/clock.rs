//! Injected time source.
//!
//! # Invariants
//! - Every instant handed out is UTC truncated to whole seconds, so stored and
//!   returned timestamps compare equal.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::{Mutex, PoisonError};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Drops sub-second precision.
pub fn truncate_to_seconds(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(0)
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_to_seconds(Utc::now())
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(truncate_to_seconds(at)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = truncate_to_seconds(at);
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = truncate_to_seconds(*current + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
