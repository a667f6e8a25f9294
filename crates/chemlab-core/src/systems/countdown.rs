//! Lab countdown timer.
//!
//! Counts whole simulated seconds down to zero. Each tick lasts `tick_ms`
//! of clock time (see `chemlab_logic::timing::tick_interval_ms`); a speed
//! change restarts the tick phase.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub remaining_secs: u32,
    pub tick_ms: u64,
    /// Clock time of the next tick; `None` while paused.
    pub next_tick_at: Option<u64>,
    /// Time to the next tick while paused (ms).
    pub until_next_tick_ms: u64,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Running(u32),
    Finished,
}

impl Countdown {
    pub fn start(seconds: u32, tick_ms: u64, now: u64) -> Self {
        Self {
            remaining_secs: seconds,
            tick_ms,
            next_tick_at: Some(now.saturating_add(tick_ms)),
            until_next_tick_ms: tick_ms,
        }
    }

    /// A countdown restored in the suspended state.
    pub fn suspended(remaining_secs: u32, tick_ms: u64, until_next_tick_ms: u64) -> Self {
        Self {
            remaining_secs,
            tick_ms,
            next_tick_at: None,
            until_next_tick_ms,
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick_at.is_some()
    }

    pub fn pause(&mut self, now: u64) {
        if let Some(at) = self.next_tick_at.take() {
            self.until_next_tick_ms = at.saturating_sub(now);
        }
    }

    pub fn resume(&mut self, now: u64) {
        if self.next_tick_at.is_none() {
            self.next_tick_at = Some(now.saturating_add(self.until_next_tick_ms));
        }
    }

    /// Restart the tick phase with a new tick length.
    pub fn set_tick_ms(&mut self, tick_ms: u64, now: u64) {
        self.tick_ms = tick_ms;
        self.until_next_tick_ms = tick_ms;
        if self.next_tick_at.is_some() {
            self.next_tick_at = Some(now.saturating_add(tick_ms));
        }
    }

    /// Time to the next tick as seen at `now`.
    pub fn until_next_at(&self, now: u64) -> u64 {
        match self.next_tick_at {
            Some(at) => at.saturating_sub(now),
            None => self.until_next_tick_ms,
        }
    }

    /// Consume one second and arm the next tick.
    pub fn tick(&mut self) -> CountdownTick {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.next_tick_at = None;
            return CountdownTick::Finished;
        }
        if let Some(at) = self.next_tick_at {
            self.next_tick_at = Some(at.saturating_add(self.tick_ms));
        }
        CountdownTick::Running(self.remaining_secs)
    }
}
