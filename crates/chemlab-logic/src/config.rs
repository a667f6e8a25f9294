//! Lab configuration - tunables that shape bench behaviour.
//!
//! Every field has a default taken from [`crate::constants`], so a
//! partially specified JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Tunable limits and defaults for a lab session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Maximum chemical units per container.
    pub container_capacity: usize,
    /// Maximum undo snapshots retained.
    pub history_limit: usize,
    /// Burner temperature at start and after reset (°C).
    pub default_temperature: f64,
    /// Dose per chemical addition (mL).
    pub default_chemical_amount: f64,
    /// Simulation speed at start and after reset.
    pub default_sim_speed: f64,
    /// Lowest speed multiplier used for timer arithmetic.
    pub min_sim_speed: f64,
    /// Reaction duration when the rule omits one (ms).
    pub default_reaction_ms: u64,
    /// Floor for adjusted reaction durations (ms).
    pub min_reaction_ms: u64,
    /// Visible observation log length.
    pub observation_capacity: usize,
    /// Equipment ids treated as vessels without catalog metadata.
    pub vessel_kinds: Vec<String>,
    /// Vessel kinds that may be poured.
    pub pourable_kinds: Vec<String>,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            container_capacity: constants::CONTAINER_CAPACITY,
            history_limit: constants::HISTORY_LIMIT,
            default_temperature: constants::DEFAULT_TEMPERATURE,
            default_chemical_amount: constants::DEFAULT_CHEMICAL_AMOUNT,
            default_sim_speed: constants::DEFAULT_SIM_SPEED,
            min_sim_speed: constants::MIN_SIM_SPEED,
            default_reaction_ms: constants::DEFAULT_REACTION_MS,
            min_reaction_ms: constants::MIN_REACTION_MS,
            observation_capacity: constants::OBSERVATION_CAPACITY,
            vessel_kinds: constants::VESSEL_KINDS.iter().map(|s| s.to_string()).collect(),
            pourable_kinds: constants::POURABLE_KINDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl LabConfig {
    /// Whether `kind` may take part in a transfer. The flask always can.
    pub fn is_pourable(&self, kind: &str) -> bool {
        kind == constants::FLASK_KIND || self.pourable_kinds.iter().any(|k| k == kind)
    }

    /// Whether `kind` is a built-in vessel name.
    pub fn is_vessel_kind(&self, kind: &str) -> bool {
        self.vessel_kinds.iter().any(|k| k == kind)
    }

    /// Clamp a requested speed to the configured minimum.
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if speed.is_finite() {
            speed.max(self.speed_floor())
        } else {
            self.default_sim_speed
        }
    }

    /// Lowest usable speed: `min_sim_speed` when it is a positive finite
    /// number, else 0.5.
    pub fn speed_floor(&self) -> f64 {
        if self.min_sim_speed.is_finite() && self.min_sim_speed > 0.0 {
            self.min_sim_speed
        } else {
            constants::MIN_SIM_SPEED
        }
    }
}
