//! Save/Load functionality for lab sessions
//!
//! A [`LabSnapshot`] is a deep copy of everything needed to rebuild the
//! lab: bench items with their components, settings, and timer state
//! expressed as remaining durations. The same type backs undo/redo, the
//! JSON local save and the compact bincode save.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::bench::BenchItemData;
use crate::components::BenchId;
use crate::engine::LabSettings;
use crate::systems::Countdown;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable copy of a lab session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabSnapshot {
    /// Save format version
    pub version: u32,
    /// Every bench item, flask first
    pub items: Vec<BenchItemData>,
    /// Next bench id to hand out
    pub next_id: u32,
    pub settings: LabSettings,
    /// In-flight reactions in scheduling order
    pub reactions: Vec<ReactionTiming>,
    /// Countdown, always stored suspended
    pub countdown: Option<Countdown>,
}

/// Time left on one scheduled completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTiming {
    pub target: BenchId,
    pub remaining_ms: u64,
}

/// Write a snapshot in bincode form
pub fn save_lab<W: Write>(writer: W, snapshot: &LabSnapshot) -> Result<(), SaveError> {
    bincode::serialize_into(writer, snapshot)?;
    Ok(())
}

/// Read a bincode snapshot, rejecting other format versions
pub fn load_lab<R: Read>(reader: R) -> Result<LabSnapshot, SaveError> {
    let snapshot: LabSnapshot = bincode::deserialize_from(reader)?;
    check_version(snapshot)
}

/// Pretty JSON for the local save slot
pub fn to_json(snapshot: &LabSnapshot) -> Result<String, SaveError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn from_json(json: &str) -> Result<LabSnapshot, SaveError> {
    let snapshot: LabSnapshot = serde_json::from_str(json)?;
    check_version(snapshot)
}

fn check_version(snapshot: LabSnapshot) -> Result<LabSnapshot, SaveError> {
    if snapshot.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}

/// Errors that can occur during save/load
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    Json(serde_json::Error),
    VersionMismatch { expected: u32, found: u32 },
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        SaveError::Json(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::Json(e) => write!(f, "JSON error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Save version mismatch: expected {}, found {}",
                    expected, found
                )
            }
        }
    }
}

impl std::error::Error for SaveError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LabCatalog;
    use crate::components::ChemicalUnit;
    use crate::engine::LabEngine;
    use chemlab_logic::catalog::ChemicalType;

    fn busy_lab() -> LabEngine {
        let mut engine = LabEngine::new(LabCatalog::default());
        let beaker = engine.place_apparatus("beaker", 45.0, 80.0);
        engine.place_apparatus("stirrer", 100.0, 20.0);
        for (name, formula) in [("Hydrochloric Acid", "HCl"), ("Water", "H2O")] {
            let unit = ChemicalUnit::new(name, formula, "#fff", ChemicalType::Acid, 10.0);
            engine.add_chemical(beaker, unit.clone()).unwrap();
            engine.add_chemical(BenchId::FLASK, unit).unwrap();
        }
        engine.start_reaction(BenchId::FLASK).unwrap();
        engine.start_countdown(1.0).unwrap();
        engine.advance(1200);
        engine
    }

    #[test]
    fn test_save_load_roundtrip() {
        let engine = busy_lab();
        let original = engine.snapshot();

        let mut save_buffer = Vec::new();
        engine.save(&mut save_buffer).expect("Save failed");

        let mut loaded_engine = LabEngine::new(LabCatalog::default());
        loaded_engine.advance(1200);
        loaded_engine.load(&save_buffer[..]).expect("Load failed");

        assert_eq!(loaded_engine.snapshot(), original);
    }

    #[test]
    fn test_json_roundtrip() {
        let engine = busy_lab();
        let json = engine.to_json().unwrap();
        assert!(json.contains("\"version\": 1"));
        assert_eq!(from_json(&json).unwrap(), engine.snapshot());
    }

    #[test]
    fn test_version_mismatch() {
        let mut snapshot = busy_lab().snapshot();
        snapshot.version = 7;
        let mut buffer = Vec::new();
        save_lab(&mut buffer, &snapshot).unwrap();
        match load_lab(&buffer[..]) {
            Err(SaveError::VersionMismatch { expected, found }) => {
                assert_eq!((expected, found), (SAVE_VERSION, 7));
            }
            other => panic!("expected version mismatch, got {:?}", other.map(|s| s.version)),
        }
    }

    #[test]
    fn test_garbage_json_is_error() {
        assert!(matches!(from_json("{\"version\": 1"), Err(SaveError::Json(_))));
    }
}
