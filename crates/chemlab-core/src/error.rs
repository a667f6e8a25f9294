//! Errors returned by lab operations.
//!
//! Every variant is recoverable: the operation that returned it left the
//! lab exactly as it found it.

use crate::components::BenchId;

#[derive(Debug, Clone, PartialEq)]
pub enum LabError {
    /// The container already holds the maximum number of units, or a
    /// transfer would overflow it.
    CapacityExceeded { id: BenchId, capacity: usize },
    /// A container involved in the operation is reacting.
    ReactionInProgress { id: BenchId },
    /// The simulation is paused.
    SimulationPaused,
    /// Fewer than two units in the container.
    InsufficientReactants { id: BenchId, present: usize },
    /// The rule needs equipment that is not on the bench.
    MissingRequirement { requirement: String },
    /// Endothermic rule with the burner off.
    MissingHeat,
    /// Bench temperature outside the rule's bounds.
    TemperatureOutOfRange {
        temperature: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Source and target are the same container.
    InvalidTransfer,
    /// An endpoint is a vessel that cannot be poured.
    UnsupportedVessel { id: BenchId, kind: String },
    /// Nothing to pour.
    EmptySource { id: BenchId },
    /// No bench item with this id (or it holds no chemicals).
    UnknownContainer { id: BenchId },
    /// The main flask cannot be removed from the bench.
    PermanentFixture,
    /// A numeric setting was NaN or infinite.
    InvalidSetting { name: &'static str },
}

impl std::fmt::Display for LabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabError::CapacityExceeded { id, capacity } => write!(
                f,
                "{} supports reactions between up to {} chemicals",
                id, capacity
            ),
            LabError::ReactionInProgress { id } => {
                write!(f, "Reaction already in progress in {}", id)
            }
            LabError::SimulationPaused => write!(f, "Simulation is paused"),
            LabError::InsufficientReactants { id, present } => write!(
                f,
                "Need at least 2 chemicals for a reaction ({} has {})",
                id, present
            ),
            LabError::MissingRequirement { requirement } => {
                write!(f, "This reaction requires a {} on the bench", requirement)
            }
            LabError::MissingHeat => {
                write!(f, "This reaction requires heat: turn on the burner first")
            }
            LabError::TemperatureOutOfRange {
                temperature,
                min,
                max,
            } => match (min, max) {
                (Some(min), _) if temperature < min => {
                    write!(f, "This reaction needs at least {}°C (now {}°C)", min, temperature)
                }
                (_, Some(max)) if temperature > max => {
                    write!(f, "This reaction must stay below {}°C (now {}°C)", max, temperature)
                }
                _ => write!(f, "Temperature {}°C is out of range", temperature),
            },
            LabError::InvalidTransfer => write!(f, "Cannot pour a container into itself"),
            LabError::UnsupportedVessel { id, kind } => {
                write!(f, "Transfer not supported for {} ({})", kind, id)
            }
            LabError::EmptySource { id } => write!(f, "Nothing to pour from {}", id),
            LabError::UnknownContainer { id } => write!(f, "No container {} on the bench", id),
            LabError::PermanentFixture => write!(f, "The main flask cannot be removed"),
            LabError::InvalidSetting { name } => write!(f, "Invalid value for {}", name),
        }
    }
}

impl std::error::Error for LabError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_messages() {
        let low = LabError::TemperatureOutOfRange {
            temperature: 20.0,
            min: Some(60.0),
            max: None,
        };
        assert_eq!(low.to_string(), "This reaction needs at least 60°C (now 20°C)");

        let high = LabError::TemperatureOutOfRange {
            temperature: 120.0,
            min: Some(60.0),
            max: Some(90.0),
        };
        assert_eq!(high.to_string(), "This reaction must stay below 90°C (now 120°C)");
    }

    #[test]
    fn test_capacity_message() {
        let err = LabError::CapacityExceeded {
            id: BenchId::FLASK,
            capacity: 3,
        };
        assert_eq!(err.to_string(), "flask supports reactions between up to 3 chemicals");
    }
}
