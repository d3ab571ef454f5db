//! Busy/idle accounting per worker, for load reporting

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Busy,
    Idle,
}

#[derive(Debug)]
struct UnitLoad {
    state: UnitState,
    since: Instant,
    busy: Duration,
    idle: Duration,
}

/// Accumulated load of one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerLoad {
    pub busy: Duration,
    pub idle: Duration,
}

impl WorkerLoad {
    /// Share of tracked time spent busy, in percent
    pub fn utilization(&self) -> f64 {
        let total = self.busy + self.idle;
        if total.is_zero() {
            return 0.0;
        }

        self.busy.as_secs_f64() / total.as_secs_f64() * 100.0
    }
}

pub struct Timekeeper {
    units: Mutex<Vec<UnitLoad>>,
}

impl Timekeeper {
    /// Creates a timekeeper with `units` idle units
    pub fn new(units: usize) -> Self {
        let now = Instant::now();
        let units = (0..units)
            .map(|_| UnitLoad {
                state: UnitState::Idle,
                since: now,
                busy: Duration::ZERO,
                idle: Duration::ZERO,
            })
            .collect();

        Self {
            units: Mutex::new(units),
        }
    }

    /// Switches unit `index` to `state`, charging the elapsed time to the old one
    pub fn update(&self, index: usize, state: UnitState) {
        let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(unit) = units.get_mut(index) else {
            return;
        };

        if unit.state == state {
            return;
        }

        let now = Instant::now();
        let elapsed = now - unit.since;
        match unit.state {
            UnitState::Busy => unit.busy += elapsed,
            UnitState::Idle => unit.idle += elapsed,
        }

        unit.state = state;
        unit.since = now;
    }

    pub fn snapshot(&self) -> Vec<WorkerLoad> {
        let units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        units
            .iter()
            .map(|unit| {
                let mut load = WorkerLoad {
                    busy: unit.busy,
                    idle: unit.idle,
                };
                match unit.state {
                    UnitState::Busy => load.busy += now - unit.since,
                    UnitState::Idle => load.idle += now - unit.since,
                }
                load
            })
            .collect()
    }
}
