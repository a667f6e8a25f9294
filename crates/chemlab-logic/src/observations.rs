//! Observation kinds and the relevance filter for the observation panel.

use serde::{Deserialize, Serialize};

/// Severity of a lab observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Info,
    Success,
    Warning,
    Danger,
}

impl ObservationKind {
    /// Warnings and dangers are mirrored into the warnings panel.
    pub fn is_alert(&self) -> bool {
        matches!(self, ObservationKind::Warning | ObservationKind::Danger)
    }

    pub fn color(&self) -> &'static str {
        match self {
            ObservationKind::Success => "#00cc66",
            ObservationKind::Warning => "#ff9900",
            ObservationKind::Danger => "#ff3333",
            ObservationKind::Info => "#8a2be2",
        }
    }
}

const REACTION_KEYWORDS: &[&str] = &[
    "reaction",
    "react",
    "product",
    "precipitate",
    "neutralization",
    "bubbling",
    "gas",
    "heat",
    "temperature",
    "endothermic",
    "exothermic",
    "stirring",
    "stirrer",
];

/// Whether an observation belongs in the reaction-focused panel.
/// Non-info observations always do; info lines only when they mention
/// something reaction related.
pub fn is_reaction_relevant(kind: ObservationKind, text: &str) -> bool {
    if kind != ObservationKind::Info {
        return true;
    }
    let lowered = text.to_lowercase();
    REACTION_KEYWORDS.iter().any(|k| lowered.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alerts_always_relevant() {
        assert!(is_reaction_relevant(ObservationKind::Warning, "Placed beaker"));
        assert!(is_reaction_relevant(ObservationKind::Success, "Saved"));
    }

    #[test]
    fn test_info_filtered_by_keyword() {
        assert!(is_reaction_relevant(ObservationKind::Info, "Reaction started in flask"));
        assert!(is_reaction_relevant(ObservationKind::Info, "Temperature adjusted to 120°C"));
        assert!(!is_reaction_relevant(ObservationKind::Info, "Placed beaker on bench"));
    }
}
