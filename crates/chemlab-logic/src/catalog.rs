//! Chemical and equipment catalog records.
//!
//! These mirror the JSON the stock panels are filled from. Parsing lives
//! in `chemlab-core`; this module only defines the shapes and the
//! identifier rules the rule table depends on.

use serde::{Deserialize, Serialize};

/// Broad hazard class of a chemical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChemicalType {
    Acid,
    Base,
    Salt,
    Indicator,
    Oxidizer,
    Reagent,
    Gas,
    Solvent,
    #[default]
    Unknown,
}

impl ChemicalType {
    pub const ALL: [ChemicalType; 9] = [
        ChemicalType::Acid,
        ChemicalType::Base,
        ChemicalType::Salt,
        ChemicalType::Indicator,
        ChemicalType::Oxidizer,
        ChemicalType::Reagent,
        ChemicalType::Gas,
        ChemicalType::Solvent,
        ChemicalType::Unknown,
    ];

    /// Parse a catalog type string, case-insensitively. Anything
    /// unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "acid" => ChemicalType::Acid,
            "base" => ChemicalType::Base,
            "salt" => ChemicalType::Salt,
            "indicator" => ChemicalType::Indicator,
            "oxidizer" => ChemicalType::Oxidizer,
            "reagent" => ChemicalType::Reagent,
            "gas" => ChemicalType::Gas,
            "solvent" => ChemicalType::Solvent,
            _ => ChemicalType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChemicalType::Acid => "acid",
            ChemicalType::Base => "base",
            ChemicalType::Salt => "salt",
            ChemicalType::Indicator => "indicator",
            ChemicalType::Oxidizer => "oxidizer",
            ChemicalType::Reagent => "reagent",
            ChemicalType::Gas => "gas",
            ChemicalType::Solvent => "solvent",
            ChemicalType::Unknown => "unknown",
        }
    }
}

impl From<String> for ChemicalType {
    fn from(s: String) -> Self {
        ChemicalType::parse(&s)
    }
}

impl From<ChemicalType> for String {
    fn from(t: ChemicalType) -> Self {
        t.as_str().to_string()
    }
}

/// Physical state inferred from id/formula markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicalState {
    Aqueous,
    Gas,
    Solid,
    Liquid,
}

/// Infer the physical state of a chemical: `_aq` ids and `(aq)` formulas
/// are aqueous, `(g)` gas, `(s)` solid, anything else liquid.
pub fn physical_state(id: &str, formula: &str) -> PhysicalState {
    let id = id.to_ascii_lowercase();
    let formula = formula.to_ascii_lowercase();
    if id.contains("_aq") || formula.contains("(aq)") {
        PhysicalState::Aqueous
    } else if formula.contains("(g)") {
        PhysicalState::Gas
    } else if formula.contains("(s)") {
        PhysicalState::Solid
    } else {
        PhysicalState::Liquid
    }
}

/// One entry of the chemical stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub formula: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(rename = "type", default)]
    pub chem_type: ChemicalType,
}

fn default_color() -> String {
    "#8a2be2".to_string()
}

impl ChemicalSpec {
    /// Identifier used for rule keys: formula, else id, else name,
    /// trimmed and uppercased. Empty when all three are blank.
    pub fn identifier(&self) -> String {
        [&self.formula, &self.id, &self.name]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("")
            .to_uppercase()
    }

    pub fn physical_state(&self) -> PhysicalState {
        physical_state(&self.id, &self.formula)
    }
}

/// `{ "chemicals": [...] }` wrapper used by the stock JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChemicalCatalog {
    #[serde(default)]
    pub chemicals: Vec<ChemicalSpec>,
}

impl ChemicalCatalog {
    /// Find a chemical by id, formula or name (case-insensitive).
    pub fn find(&self, query: &str) -> Option<&ChemicalSpec> {
        let q = query.trim();
        self.chemicals.iter().find(|c| {
            c.id.eq_ignore_ascii_case(q)
                || c.formula.eq_ignore_ascii_case(q)
                || c.name.eq_ignore_ascii_case(q)
        })
    }

    /// Chemicals of one type, in catalog order.
    pub fn of_type(&self, chem_type: ChemicalType) -> impl Iterator<Item = &ChemicalSpec> {
        self.chemicals
            .iter()
            .filter(move |c| c.chem_type == chem_type)
    }

    /// Case-insensitive substring search over name and formula.
    pub fn search<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a ChemicalSpec> {
        let q = query.trim().to_lowercase();
        self.chemicals.iter().filter(move |c| {
            q.is_empty()
                || c.name.to_lowercase().contains(&q)
                || c.formula.to_lowercase().contains(&q)
        })
    }

    /// Distinct non-empty identifiers, in catalog order.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for chem in &self.chemicals {
            let id = chem.identifier();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// One entry of the equipment stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub equipment_type: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

impl EquipmentSpec {
    pub fn is_vessel(&self) -> bool {
        self.equipment_type.eq_ignore_ascii_case("vessel")
    }
}

/// `{ "equipment": [...] }` wrapper used by the stock JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquipmentCatalog {
    #[serde(default)]
    pub equipment: Vec<EquipmentSpec>,
}

impl EquipmentCatalog {
    pub fn get(&self, id: &str) -> Option<&EquipmentSpec> {
        self.equipment.iter().find(|e| e.id == id)
    }

    /// Whether the catalog marks `id` as a vessel. `None` when the id is
    /// not in the catalog at all.
    pub fn marks_vessel(&self, id: &str) -> Option<bool> {
        self.get(id).map(EquipmentSpec::is_vessel)
    }
}
