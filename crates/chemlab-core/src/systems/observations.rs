//! Observation log - what the student sees happen on the bench.

use std::collections::VecDeque;

use chemlab_logic::observations::ObservationKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Clock time the observation was made (ms).
    pub at_ms: u64,
    pub kind: ObservationKind,
    pub text: String,
}

/// Bounded log, newest first. Alerts are mirrored into a second list.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    entries: VecDeque<Observation>,
    warnings: VecDeque<Observation>,
    capacity: usize,
}

impl ObservationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            warnings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, at_ms: u64, kind: ObservationKind, text: impl Into<String>) {
        let observation = Observation {
            at_ms,
            kind,
            text: text.into(),
        };
        if kind.is_alert() {
            self.warnings.push_front(observation.clone());
            self.warnings.truncate(self.capacity);
        }
        self.entries.push_front(observation);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &Observation> {
        self.entries.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Observation> {
        self.warnings.iter()
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.warnings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_and_bounded() {
        let mut log = ObservationLog::new(3);
        for i in 0..5 {
            log.push(i, ObservationKind::Info, format!("entry {}", i));
        }
        let texts: Vec<&str> = log.entries().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["entry 4", "entry 3", "entry 2"]);
    }

    #[test]
    fn test_alerts_mirrored() {
        let mut log = ObservationLog::new(10);
        log.push(0, ObservationKind::Info, "Added HCl");
        log.push(1, ObservationKind::Danger, "Burner on");
        assert_eq!(log.len(), 2);
        assert_eq!(log.warnings().count(), 1);
        assert_eq!(log.latest().unwrap().text, "Burner on");
    }
}
