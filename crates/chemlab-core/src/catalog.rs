//! Catalog loading - chemicals, equipment and reaction rules from JSON.
//!
//! A broken chemical or equipment file is an error. A broken reactions
//! file is not: the lab still works, every mixture just reports that no
//! rule is defined.

use std::collections::BTreeMap;

use chemlab_logic::catalog::{ChemicalCatalog, EquipmentCatalog};
use chemlab_logic::reactions::{RawReaction, RuleTable};

/// Everything the lab needs to know about the world.
#[derive(Debug, Clone, Default)]
pub struct LabCatalog {
    pub chemicals: ChemicalCatalog,
    pub equipment: EquipmentCatalog,
    pub rules: RuleTable,
}

impl LabCatalog {
    /// Parse the three catalog documents and build the rule table.
    pub fn from_json(
        chemicals_json: &str,
        equipment_json: &str,
        reactions_json: &str,
    ) -> Result<Self, CatalogError> {
        let chemicals: ChemicalCatalog =
            serde_json::from_str(chemicals_json).map_err(CatalogError::Chemicals)?;
        let equipment: EquipmentCatalog =
            serde_json::from_str(equipment_json).map_err(CatalogError::Equipment)?;
        let rules = parse_rules(reactions_json, &chemicals.identifiers());

        log::info!(
            "Catalog loaded: {} chemicals, {} equipment, {} rules ({} placeholders)",
            chemicals.chemicals.len(),
            equipment.equipment.len(),
            rules.len(),
            rules.placeholder_count()
        );

        Ok(Self {
            chemicals,
            equipment,
            rules,
        })
    }

    /// Catalog with the given chemicals and rules and no equipment data.
    pub fn with_rules(chemicals: ChemicalCatalog, rules: RuleTable) -> Self {
        Self {
            chemicals,
            equipment: EquipmentCatalog::default(),
            rules,
        }
    }
}

/// Parse the reactions document into a normalized table. A malformed
/// document yields an empty table (plus placeholders); malformed entries
/// are skipped. Both cases are logged.
pub fn parse_rules(reactions_json: &str, chemical_ids: &[String]) -> RuleTable {
    let raw = match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(reactions_json) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("Reaction rules unreadable, continuing without rules: {}", e);
            BTreeMap::new()
        }
    };

    let mut parsed: Vec<(String, RawReaction)> = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        match serde_json::from_value::<RawReaction>(value) {
            Ok(rule) => parsed.push((key, rule)),
            Err(e) => log::warn!("Skipping malformed reaction rule {:?}: {}", key, e),
        }
    }

    RuleTable::normalize(parsed.iter().map(|(k, r)| (k.as_str(), r)), chemical_ids)
}

#[derive(Debug)]
pub enum CatalogError {
    Chemicals(serde_json::Error),
    Equipment(serde_json::Error),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Chemicals(e) => write!(f, "Invalid chemical catalog: {}", e),
            CatalogError::Equipment(e) => write!(f, "Invalid equipment catalog: {}", e),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Chemicals(e) | CatalogError::Equipment(e) => Some(e),
        }
    }
}
