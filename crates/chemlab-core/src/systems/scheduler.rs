//! Reaction scheduler - timed completions, one entry per reacting target.
//!
//! Entries are keyed by [`BenchId`]; scheduling a target that already has
//! an entry replaces it. Pausing converts every running entry into a
//! remaining duration and resuming re-arms it against the current clock,
//! so no elapsed time is lost or double counted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::BenchId;

/// One pending completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReaction {
    pub target: BenchId,
    /// Clock time of completion; `None` while paused.
    pub due_at: Option<u64>,
    /// Time left when paused (ms). Only meaningful while `due_at` is `None`.
    pub remaining_ms: u64,
    /// Scheduling order, used to pick the most recent entry.
    pub seq: u64,
}

impl ScheduledReaction {
    /// Time left at `now`.
    pub fn remaining_at(&self, now: u64) -> u64 {
        match self.due_at {
            Some(due) => due.saturating_sub(now),
            None => self.remaining_ms,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReactionScheduler {
    entries: BTreeMap<BenchId, ScheduledReaction>,
    paused: bool,
    next_seq: u64,
}

impl ReactionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a completion `duration_ms` after `now`, replacing any entry for
    /// the same target. While paused the entry is stored suspended.
    pub fn schedule(&mut self, target: BenchId, duration_ms: u64, now: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let due_at = if self.paused {
            None
        } else {
            Some(now.saturating_add(duration_ms))
        };
        self.entries.insert(
            target,
            ScheduledReaction {
                target,
                due_at,
                remaining_ms: duration_ms,
                seq,
            },
        );
    }

    /// Drop the entry for `target`. Returns whether one existed.
    pub fn cancel(&mut self, target: BenchId) -> bool {
        self.entries.remove(&target).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    /// Suspend every running entry. Idempotent.
    pub fn pause(&mut self, now: u64) {
        self.paused = true;
        for entry in self.entries.values_mut() {
            if let Some(due) = entry.due_at.take() {
                entry.remaining_ms = due.saturating_sub(now);
            }
        }
    }

    /// Re-arm suspended entries against `now`. No-op when not paused.
    pub fn resume(&mut self, now: u64) {
        if !self.paused {
            return;
        }
        self.paused = false;
        for entry in self.entries.values_mut() {
            if entry.due_at.is_none() {
                entry.due_at = Some(now.saturating_add(entry.remaining_ms));
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Earliest due time among running entries.
    pub fn next_due(&self) -> Option<u64> {
        self.entries.values().filter_map(|e| e.due_at).min()
    }

    /// Remove and return the earliest entry due at or before `now`.
    /// Ties go to the entry scheduled first.
    pub fn pop_due(&mut self, now: u64) -> Option<ScheduledReaction> {
        let target = self
            .entries
            .values()
            .filter(|e| e.due_at.map_or(false, |due| due <= now))
            .min_by_key(|e| (e.due_at, e.seq))
            .map(|e| e.target)?;
        self.entries.remove(&target)
    }

    pub fn is_scheduled(&self, target: BenchId) -> bool {
        self.entries.contains_key(&target)
    }

    pub fn get(&self, target: BenchId) -> Option<&ScheduledReaction> {
        self.entries.get(&target)
    }

    /// The entry scheduled last.
    pub fn most_recent(&self) -> Option<&ScheduledReaction> {
        self.entries.values().max_by_key(|e| e.seq)
    }

    /// `(target, remaining)` pairs in scheduling order.
    pub fn remaining(&self, now: u64) -> Vec<(BenchId, u64)> {
        let mut entries: Vec<&ScheduledReaction> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
            .into_iter()
            .map(|e| (e.target, e.remaining_at(now)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and leave the scheduler running.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.paused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_and_fire_once() {
        let mut s = ReactionScheduler::new();
        s.schedule(BenchId::FLASK, 3000, 0);
        assert_eq!(s.next_due(), Some(3000));
        assert!(s.pop_due(2999).is_none());
        assert_eq!(s.pop_due(3000).unwrap().target, BenchId::FLASK);
        assert!(s.pop_due(10_000).is_none());
    }

    #[test]
    fn test_reschedule_replaces() {
        let mut s = ReactionScheduler::new();
        s.schedule(BenchId(1), 3000, 0);
        s.schedule(BenchId(1), 1000, 500);
        assert_eq!(s.len(), 1);
        assert_eq!(s.next_due(), Some(1500));
    }

    #[test]
    fn test_pause_resume_preserves_remaining() {
        let mut s = ReactionScheduler::new();
        s.schedule(BenchId::FLASK, 3000, 0);
        s.pause(1000);
        s.pause(1500);
        assert_eq!(s.get(BenchId::FLASK).unwrap().remaining_ms, 2000);
        assert!(s.pop_due(100_000).is_none());

        s.resume(5000);
        assert_eq!(s.next_due(), Some(7000));
        s.resume(6000);
        assert_eq!(s.next_due(), Some(7000));
    }

    #[test]
    fn test_schedule_while_paused_is_suspended() {
        let mut s = ReactionScheduler::new();
        s.pause(0);
        s.schedule(BenchId(2), 900, 100);
        assert_eq!(s.next_due(), None);
        s.resume(1000);
        assert_eq!(s.next_due(), Some(1900));
    }

    #[test]
    fn test_cancel() {
        let mut s = ReactionScheduler::new();
        s.schedule(BenchId(1), 1000, 0);
        assert!(s.cancel(BenchId(1)));
        assert!(!s.cancel(BenchId(1)));
        assert!(s.pop_due(5000).is_none());
    }

    #[test]
    fn test_pop_due_orders_by_time_then_seq() {
        let mut s = ReactionScheduler::new();
        s.schedule(BenchId(2), 1000, 0);
        s.schedule(BenchId(1), 1000, 0);
        s.schedule(BenchId::FLASK, 800, 0);
        let order: Vec<BenchId> = std::iter::from_fn(|| s.pop_due(5000).map(|e| e.target)).collect();
        assert_eq!(order, vec![BenchId::FLASK, BenchId(2), BenchId(1)]);
    }

    #[test]
    fn test_most_recent_and_remaining() {
        let mut s = ReactionScheduler::new();
        s.schedule(BenchId(3), 2000, 0);
        s.schedule(BenchId::FLASK, 1000, 100);
        assert_eq!(s.most_recent().unwrap().target, BenchId::FLASK);
        assert_eq!(
            s.remaining(600),
            vec![(BenchId(3), 1400), (BenchId::FLASK, 500)]
        );
    }
}
