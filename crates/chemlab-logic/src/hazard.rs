//! Hazard indicator for the active container.
//!
//! | Contents | Label | Color |
//! |----------|-------|-------|
//! | empty | None | grey |
//! | one distinct type | that type, capitalized | per-type |
//! | several types | Mixed | amber |

use serde::{Deserialize, Serialize};

use crate::catalog::ChemicalType;

/// What the hazard badge shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardSummary {
    pub label: String,
    pub color: String,
}

/// Badge color for a chemical type.
pub fn hazard_color(chem_type: ChemicalType) -> &'static str {
    match chem_type {
        ChemicalType::Acid => "#ff6b6b",
        ChemicalType::Base => "#ffd93d",
        ChemicalType::Salt => "#6ecbff",
        ChemicalType::Indicator => "#a98bff",
        ChemicalType::Oxidizer => "#ff8f3d",
        ChemicalType::Reagent => "#7fdc8c",
        ChemicalType::Gas => "#9ad0ff",
        ChemicalType::Solvent => "#9ed9c2",
        ChemicalType::Unknown => "#c7b8ff",
    }
}

const NONE_COLOR: &str = "#9aa3b2";
const MIXED_COLOR: &str = "#ffb347";

/// Summarize the hazard of a container's contents.
pub fn hazard_summary<I>(types: I) -> HazardSummary
where
    I: IntoIterator<Item = ChemicalType>,
{
    let mut distinct: Vec<ChemicalType> = Vec::new();
    for t in types {
        if !distinct.contains(&t) {
            distinct.push(t);
        }
    }

    match distinct.as_slice() {
        [] => HazardSummary {
            label: "None".to_string(),
            color: NONE_COLOR.to_string(),
        },
        [single] => HazardSummary {
            label: capitalize(single.as_str()),
            color: hazard_color(*single).to_string(),
        },
        _ => HazardSummary {
            label: "Mixed".to_string(),
            color: MIXED_COLOR.to_string(),
        },
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_none() {
        let summary = hazard_summary(Vec::new());
        assert_eq!(summary.label, "None");
        assert_eq!(summary.color, NONE_COLOR);
    }

    #[test]
    fn test_single_type() {
        let summary = hazard_summary([ChemicalType::Acid, ChemicalType::Acid]);
        assert_eq!(summary.label, "Acid");
        assert_eq!(summary.color, "#ff6b6b");
    }

    #[test]
    fn test_mixed() {
        let summary = hazard_summary([ChemicalType::Acid, ChemicalType::Base]);
        assert_eq!(summary.label, "Mixed");
        assert_eq!(summary.color, MIXED_COLOR);
    }

    #[test]
    fn test_unknown_only() {
        let summary = hazard_summary([ChemicalType::Unknown]);
        assert_eq!(summary.label, "Unknown");
    }
}
