//! Bench components - pure data attached to bench entities.
//!
//! Every item on the bench is a `hecs` entity carrying a [`BenchItem`].
//! Placed apparatus also carries [`Apparatus`] and [`BenchPosition`];
//! anything that can hold chemicals (the flask and every vessel) carries a
//! [`Container`].

use std::fmt;

use chemlab_logic::catalog::{ChemicalSpec, ChemicalType};
use chemlab_logic::constants::FLASK_KIND;
use chemlab_logic::reactions::{canonical_key, ReactionDescriptor, RuleTable};
use serde::{Deserialize, Serialize};

/// Stable identifier of a bench item. `0` is always the main flask;
/// placed apparatus is numbered from `1` upward and ids are never reused
/// within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BenchId(pub u32);

impl BenchId {
    pub const FLASK: BenchId = BenchId(0);

    pub fn is_flask(&self) -> bool {
        *self == Self::FLASK
    }
}

impl fmt::Display for BenchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_flask() {
            f.write_str(FLASK_KIND)
        } else {
            write!(f, "container-{}", self.0)
        }
    }
}

/// Identity component present on every bench entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchItem {
    pub id: BenchId,
}

/// What kind of apparatus was placed (`"beaker"`, `"stirrer"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apparatus {
    pub kind: String,
}

/// Grid-snapped position on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BenchPosition {
    pub x: f32,
    pub y: f32,
}

impl BenchPosition {
    pub fn snapped(x: f32, y: f32) -> Self {
        Self {
            x: chemlab_logic::constants::snap_to_grid(x),
            y: chemlab_logic::constants::snap_to_grid(y),
        }
    }
}

/// One dose of a chemical inside a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalUnit {
    pub name: String,
    pub formula: String,
    pub color: String,
    #[serde(rename = "type")]
    pub chem_type: ChemicalType,
    /// Volume in mL.
    pub amount: f64,
}

impl ChemicalUnit {
    pub fn new(name: &str, formula: &str, color: &str, chem_type: ChemicalType, amount: f64) -> Self {
        Self {
            name: name.to_string(),
            formula: formula.to_string(),
            color: color.to_string(),
            chem_type,
            amount,
        }
    }

    /// A dose of a catalog chemical.
    pub fn from_spec(spec: &ChemicalSpec, amount: f64) -> Self {
        Self {
            name: spec.name.clone(),
            formula: spec.formula.clone(),
            color: spec.color.clone(),
            chem_type: spec.chem_type,
            amount,
        }
    }

    /// Identifier used for rule keys: formula, falling back to name,
    /// uppercased.
    pub fn identifier(&self) -> String {
        let formula = self.formula.trim();
        if formula.is_empty() {
            self.name.trim().to_uppercase()
        } else {
            formula.to_uppercase()
        }
    }

    /// Text shown in equations: formula, falling back to name.
    pub fn label(&self) -> &str {
        if self.formula.trim().is_empty() {
            &self.name
        } else {
            &self.formula
        }
    }
}

/// The flask or a named vessel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    Flask,
    Vessel(String),
}

impl ContainerKind {
    pub fn name(&self) -> &str {
        match self {
            ContainerKind::Flask => FLASK_KIND,
            ContainerKind::Vessel(name) => name,
        }
    }
}

/// Lifecycle state derived from a container's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Empty,
    Filled,
    Reacting,
}

/// Anything that can hold chemicals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub kind: ContainerKind,
    /// Pour/add order is preserved.
    pub contents: Vec<ChemicalUnit>,
    pub is_reacting: bool,
    /// Actionable rule matched by the current contents, if any.
    pub pending_reaction: Option<ReactionDescriptor>,
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            contents: Vec::new(),
            is_reacting: false,
            pending_reaction: None,
        }
    }

    pub fn flask() -> Self {
        Self::new(ContainerKind::Flask)
    }

    pub fn state(&self) -> ContainerState {
        if self.is_reacting {
            ContainerState::Reacting
        } else if self.contents.is_empty() {
            ContainerState::Empty
        } else {
            ContainerState::Filled
        }
    }

    /// Canonical rule key of the current contents.
    pub fn reaction_key(&self) -> String {
        canonical_key(self.contents.iter().map(ChemicalUnit::identifier))
    }

    /// Summed volume of all units (mL).
    pub fn total_amount(&self) -> f64 {
        self.contents.iter().map(|c| c.amount).sum()
    }

    /// Empty the container and forget any pending match.
    pub fn clear(&mut self) {
        self.contents.clear();
        self.pending_reaction = None;
    }

    /// Re-match the contents against the rule table. Only actionable rules
    /// become pending; returns the rule that was looked up (actionable or
    /// not) so callers can report it.
    pub fn refresh_pending<'a>(&mut self, rules: &'a RuleTable) -> Option<&'a ReactionDescriptor> {
        if self.contents.len() < 2 {
            self.pending_reaction = None;
            return None;
        }
        let found = rules.lookup(&self.reaction_key());
        self.pending_reaction = found.filter(|r| r.is_actionable()).cloned();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemlab_logic::reactions::RawReaction;

    fn unit(name: &str, formula: &str) -> ChemicalUnit {
        ChemicalUnit::new(name, formula, "#fff", ChemicalType::Unknown, 10.0)
    }

    #[test]
    fn test_bench_id_display() {
        assert_eq!(BenchId::FLASK.to_string(), "flask");
        assert_eq!(BenchId(3).to_string(), "container-3");
    }

    #[test]
    fn test_unit_identifier_falls_back_to_name() {
        assert_eq!(unit("Hydrochloric Acid", "HCl").identifier(), "HCL");
        assert_eq!(unit("Water", " ").identifier(), "WATER");
        assert_eq!(unit("Water", "").label(), "Water");
    }

    #[test]
    fn test_container_state() {
        let mut c = Container::flask();
        assert_eq!(c.state(), ContainerState::Empty);
        c.contents.push(unit("A", "A"));
        assert_eq!(c.state(), ContainerState::Filled);
        c.is_reacting = true;
        assert_eq!(c.state(), ContainerState::Reacting);
    }

    #[test]
    fn test_refresh_pending_only_keeps_actionable() {
        let rule = RawReaction {
            product: Some("NaCl".into()),
            color: Some("#fff".into()),
            kind: Some("neutralization".into()),
            ..Default::default()
        };
        let ids = vec!["HCL".to_string(), "NAOH".to_string(), "H2O".to_string()];
        let rules = RuleTable::normalize([("HCL+NAOH", &rule)], &ids);

        let mut c = Container::flask();
        c.contents.push(unit("Sodium Hydroxide", "NaOH"));
        assert!(c.refresh_pending(&rules).is_none());

        c.contents.push(unit("Hydrochloric Acid", "HCl"));
        assert!(c.refresh_pending(&rules).is_some());
        assert_eq!(c.pending_reaction.as_ref().unwrap().key, "HCL+NAOH");

        c.contents[1] = unit("Water", "H2O");
        let looked_up = c.refresh_pending(&rules).unwrap();
        assert!(!looked_up.is_actionable());
        assert!(c.pending_reaction.is_none());
    }

    #[test]
    fn test_position_snaps() {
        let p = BenchPosition::snapped(33.0, 51.0);
        assert_eq!(p, BenchPosition { x: 40.0, y: 60.0 });
    }
}
