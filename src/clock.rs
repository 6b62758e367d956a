//! Wall-clock source.
//!
//! Scheduling works in host-local naive time. The scheduler and the
//! escalation controller read "now" through [`Clock`] so tests can drive
//! time by hand.

use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDateTime};

use crate::task::truncate_to_seconds;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Host local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_seconds(Local::now().naive_local())
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) -> NaiveDateTime {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += by;
        *guard
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}
