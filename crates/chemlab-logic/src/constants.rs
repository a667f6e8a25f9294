//! Shared constants for the lab bench.
//!
//! Defaults here seed [`crate::config::LabConfig`]; code that has a config
//! at hand should read the config instead.

/// Maximum number of chemical units a single container may hold.
pub const CONTAINER_CAPACITY: usize = 3;

/// Maximum number of undo snapshots retained.
pub const HISTORY_LIMIT: usize = 30;

/// Temperature the burner dial returns to on reset (°C).
pub const DEFAULT_TEMPERATURE: f64 = 100.0;

/// Default dose added per chemical drop (mL).
pub const DEFAULT_CHEMICAL_AMOUNT: f64 = 10.0;

/// Simulation speed multiplier at session start.
pub const DEFAULT_SIM_SPEED: f64 = 1.0;

/// Lowest simulation speed honoured by timer arithmetic.
pub const MIN_SIM_SPEED: f64 = 0.5;

/// Reaction duration used when a rule does not specify one (ms).
pub const DEFAULT_REACTION_MS: u64 = 3_000;

/// Reactions never complete faster than this, whatever the speed (ms).
pub const MIN_REACTION_MS: u64 = 800;

/// Countdown ticks are never shorter than this (ms).
pub const MIN_TICK_MS: u64 = 200;

/// Observation entries kept visible in the log.
pub const OBSERVATION_CAPACITY: usize = 10;

/// Bench positions snap to this grid.
pub const GRID_SIZE: f32 = 20.0;

/// Identifier of the permanent main flask.
pub const FLASK_KIND: &str = "flask";

/// Placeholder type for pairs with no defined rule.
pub const TYPE_UNKNOWN: &str = "unknown";

/// Rule type meaning "mixing these does nothing".
pub const TYPE_NO_REACTION: &str = "no reaction";

/// Observation stored on generated placeholder rules.
pub const NO_RULE_OBSERVATION: &str = "No reaction rule defined for this combination.";

/// Capability tag for rules that need a stirrer on the bench.
pub const REQUIRES_STIRRER: &str = "stirrer";

/// Equipment ids that behave as vessels even without catalog metadata.
pub const VESSEL_KINDS: &[&str] = &[
    "beaker",
    "graduated_cylinder",
    "volumetric_flask",
    "test_tube",
    "watch_glass",
    "crucible",
    "burette",
];

/// Vessel kinds whose contents can be poured into another container.
pub const POURABLE_KINDS: &[&str] = &["beaker", "test_tube"];

/// Apparatus kinds that set a capability flag when placed.
pub mod apparatus {
    pub const STIRRER: &str = "stirrer";
    pub const CONDENSER: &str = "condenser";
    pub const STAND: &str = "stand";
    pub const RETORT_STAND: &str = "retort_stand";
    pub const BURNER: &str = "burner";
}

/// Snap a bench coordinate to the nearest grid line.
pub fn snap_to_grid(value: f32) -> f32 {
    (value / GRID_SIZE).round() * GRID_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(0.0), 0.0);
        assert_eq!(snap_to_grid(9.0), 0.0);
        assert_eq!(snap_to_grid(11.0), 20.0);
        assert_eq!(snap_to_grid(-31.0), -40.0);
    }

    #[test]
    fn test_pourable_kinds_are_vessels() {
        for kind in POURABLE_KINDS {
            assert!(VESSEL_KINDS.contains(kind), "{} must be a vessel", kind);
        }
    }
}
