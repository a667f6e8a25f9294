//! Reaction rule table - order-insensitive lookup of what two or three
//! chemicals do when mixed.
//!
//! Rules arrive keyed by `+`-joined reactant identifiers in whatever order
//! and case the author typed. [`RuleTable::normalize`] rewrites every key
//! to its canonical form (trimmed, uppercased, sorted) and fills in an
//! `"unknown"` placeholder for every catalog pair that has no rule, so a
//! lookup for two catalog chemicals always finds something.
//!
//! ```
//! use chemlab_logic::reactions::{canonical_key, RawReaction, RuleTable};
//!
//! let raw = RawReaction {
//!     product: Some("NaCl".into()),
//!     color: Some("#ffffff".into()),
//!     kind: Some("neutralization".into()),
//!     ..Default::default()
//! };
//! let table = RuleTable::normalize([("NaOH + HCl", &raw)], &[]);
//! let rule = table.lookup(&canonical_key(["hcl", "NAOH"])).unwrap();
//! assert!(rule.is_actionable());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{
    NO_RULE_OBSERVATION, REQUIRES_STIRRER, TYPE_NO_REACTION, TYPE_UNKNOWN,
};

/// Build the canonical rule key for a set of reactant identifiers.
///
/// Parts are trimmed and uppercased, empty parts dropped, then sorted and
/// joined with `+`.
pub fn canonical_key<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parts: Vec<String> = parts
        .into_iter()
        .map(|p| p.as_ref().trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect();
    parts.sort();
    parts.join("+")
}

/// Canonical form of a raw `"A+B"` catalog key.
pub fn canonical_key_from_raw(raw: &str) -> String {
    canonical_key(raw.split('+'))
}

// ── Raw catalog form ───────────────────────────────────────────────────

/// Observations may be written as one string or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawObservations {
    One(String),
    Many(Vec<String>),
}

impl RawObservations {
    fn into_vec(self) -> Vec<String> {
        match self {
            RawObservations::One(s) if s.trim().is_empty() => Vec::new(),
            RawObservations::One(s) => vec![s],
            RawObservations::Many(v) => v,
        }
    }
}

/// A rule exactly as it appears in the reactions JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReaction {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub heat: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub min_temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub duration_seconds: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub requires: Option<Vec<String>>,
    #[serde(default)]
    pub observations: Option<RawObservations>,
}

/// Accept numbers, numeric strings, empty strings and null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    let value: Option<NumberOrText> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrText::Number(n)) if n.is_finite() => Some(n),
        Some(NumberOrText::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

// ── Normalized form ────────────────────────────────────────────────────

/// Classification of a rule. `NoReaction` and `Unknown` are informational;
/// everything else names a real reaction type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReactionKind {
    NoReaction,
    Unknown,
    Named(String),
}

impl ReactionKind {
    pub fn is_informational(&self) -> bool {
        matches!(self, ReactionKind::NoReaction | ReactionKind::Unknown)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReactionKind::NoReaction => TYPE_NO_REACTION,
            ReactionKind::Unknown => TYPE_UNKNOWN,
            ReactionKind::Named(name) => name,
        }
    }
}

impl From<String> for ReactionKind {
    fn from(s: String) -> Self {
        let lowered = s.trim().to_lowercase();
        match lowered.as_str() {
            TYPE_NO_REACTION => ReactionKind::NoReaction,
            TYPE_UNKNOWN => ReactionKind::Unknown,
            "" => ReactionKind::Named("other".to_string()),
            _ => ReactionKind::Named(lowered),
        }
    }
}

impl From<ReactionKind> for String {
    fn from(kind: ReactionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionDescriptor {
    /// Canonical reactant key (`HCL+NAOH`).
    pub key: String,
    pub product: Option<String>,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
    /// Heat classification text (`"exothermic"`, `"endothermic"`, ...).
    pub heat: Option<String>,
    /// Capability tags the bench must provide, lowercased.
    pub requires: BTreeSet<String>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    /// Unscaled duration; `None` means the lab default.
    pub duration_ms: Option<u64>,
    pub observations: Vec<String>,
}

impl ReactionDescriptor {
    /// Normalize one raw rule under an already canonical key.
    pub fn from_raw(key: String, raw: &RawReaction) -> Self {
        let non_empty = |s: &Option<String>| {
            s.as_ref()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let duration_ms = raw
            .duration_ms
            .or_else(|| raw.duration_seconds.map(|s| s * 1000.0))
            .filter(|ms| *ms >= 0.0)
            .map(|ms| ms.round() as u64);

        Self {
            key,
            product: non_empty(&raw.product),
            color: non_empty(&raw.color),
            kind: ReactionKind::from(raw.kind.clone().unwrap_or_default()),
            heat: non_empty(&raw.heat),
            requires: raw
                .requires
                .iter()
                .flatten()
                .map(|r| r.trim().to_lowercase())
                .filter(|r| !r.is_empty())
                .collect(),
            min_temp: raw.min_temp,
            max_temp: raw.max_temp,
            duration_ms,
            observations: raw
                .observations
                .clone()
                .map(RawObservations::into_vec)
                .unwrap_or_default(),
        }
    }

    /// Placeholder for a catalog pair with no authored rule.
    pub fn placeholder(key: String) -> Self {
        Self {
            key,
            product: None,
            color: None,
            kind: ReactionKind::Unknown,
            heat: None,
            requires: BTreeSet::new(),
            min_temp: None,
            max_temp: None,
            duration_ms: None,
            observations: vec![NO_RULE_OBSERVATION.to_string()],
        }
    }

    /// A startable reaction: has a product and is not informational.
    pub fn is_actionable(&self) -> bool {
        self.product.is_some() && !self.kind.is_informational()
    }

    /// Whether completion replaces the contents with the product.
    pub fn shows_visible_change(&self) -> bool {
        self.color.is_some() && !self.kind.is_informational()
    }

    pub fn requires_stirrer(&self) -> bool {
        self.requires.contains(REQUIRES_STIRRER)
    }

    pub fn is_endothermic(&self) -> bool {
        self.heat
            .as_deref()
            .map(|h| h.to_lowercase().contains("endothermic"))
            .unwrap_or(false)
    }

    /// Whether `temperature` lies within the rule's bounds (inclusive).
    pub fn accepts_temperature(&self, temperature: f64) -> bool {
        self.min_temp.map_or(true, |min| temperature >= min)
            && self.max_temp.map_or(true, |max| temperature <= max)
    }

    /// Text logged when the reaction finishes.
    pub fn completion_summary(&self) -> String {
        let mut text = if !self.observations.is_empty() {
            self.observations.join("; ")
        } else if let Some(product) = &self.product {
            format!("Reaction produced: {}", product)
        } else {
            "Reaction completed".to_string()
        };
        if let Some(heat) = &self.heat {
            text.push_str(&format!(" [{}]", heat));
        }
        text
    }
}

/// Canonical-key → descriptor map, built once per session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    rules: BTreeMap<String, ReactionDescriptor>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from raw `(key, rule)` pairs plus the catalog's
    /// chemical identifiers. Later raw entries win when two raw keys
    /// normalize to the same canonical key; keys with no components are
    /// skipped.
    pub fn normalize<'a, I>(raw: I, chemical_ids: &[String]) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a RawReaction)>,
    {
        let mut table = Self::new();
        for (raw_key, rule) in raw {
            let key = canonical_key_from_raw(raw_key);
            if key.is_empty() {
                continue;
            }
            table.insert(ReactionDescriptor::from_raw(key, rule));
        }
        table.fill_placeholders(chemical_ids);
        table
    }

    /// Insert a placeholder for every unordered pair of identifiers that
    /// has no rule yet.
    pub fn fill_placeholders(&mut self, chemical_ids: &[String]) {
        for (i, a) in chemical_ids.iter().enumerate() {
            for b in &chemical_ids[i + 1..] {
                let key = canonical_key([a, b]);
                if key.is_empty() || !key.contains('+') {
                    continue;
                }
                self.rules
                    .entry(key.clone())
                    .or_insert_with(|| ReactionDescriptor::placeholder(key));
            }
        }
    }

    pub fn insert(&mut self, descriptor: ReactionDescriptor) {
        self.rules.insert(descriptor.key.clone(), descriptor);
    }

    /// Look up by canonical key.
    pub fn lookup(&self, key: &str) -> Option<&ReactionDescriptor> {
        self.rules.get(key)
    }

    /// Look up by reactant identifiers in any order or case.
    pub fn lookup_reactants<S: AsRef<str>>(&self, reactants: &[S]) -> Option<&ReactionDescriptor> {
        self.lookup(&canonical_key(reactants))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReactionDescriptor> {
        self.rules.values()
    }

    pub fn actionable(&self) -> impl Iterator<Item = &ReactionDescriptor> {
        self.rules.values().filter(|r| r.is_actionable())
    }

    pub fn placeholder_count(&self) -> usize {
        self.rules
            .values()
            .filter(|r| r.kind == ReactionKind::Unknown && r.product.is_none())
            .count()
    }
}

// ── Raw data validation ────────────────────────────────────────────────

/// Problems found in the raw keys of a reactions file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleReport {
    pub total: usize,
    /// Keys with an empty component (`"HCL++NAOH"`, `"+NAOH"`).
    pub empty_components: Vec<String>,
    /// Canonical key → raw keys that collapse onto it (2 or more).
    pub duplicates: Vec<(String, Vec<String>)>,
    /// Keys whose parentheses do not balance.
    pub unbalanced: Vec<String>,
    /// Keys written with lowercase letters.
    pub lowercase: Vec<String>,
}

impl RuleReport {
    /// Whether the report has nothing worth fixing. Lowercase keys are
    /// style only and do not count.
    pub fn is_clean(&self) -> bool {
        self.empty_components.is_empty() && self.duplicates.is_empty() && self.unbalanced.is_empty()
    }
}

/// Audit raw rule keys without building a table.
pub fn validate_raw_rules<'a, I>(keys: I) -> RuleReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut report = RuleReport::default();
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for raw in keys {
        report.total += 1;
        if raw.split('+').any(|part| part.trim().is_empty()) {
            report.empty_components.push(raw.to_string());
        }
        if raw.matches('(').count() != raw.matches(')').count() {
            report.unbalanced.push(raw.to_string());
        }
        if raw.chars().any(|c| c.is_lowercase()) {
            report.lowercase.push(raw.to_string());
        }
        groups
            .entry(canonical_key_from_raw(raw))
            .or_default()
            .push(raw.to_string());
    }

    report.duplicates = groups
        .into_iter()
        .filter(|(_, raws)| raws.len() > 1)
        .collect();
    report
}

// ── Presentation helpers ───────────────────────────────────────────────

/// Short requirements suffix shown next to a detected reaction, e.g.
/// `" (Requirements: stirrer required, min 60°C, ~5s)"`. Empty when the
/// rule has no requirements.
pub fn requirement_hint(rule: &ReactionDescriptor) -> String {
    let mut parts = Vec::new();
    if rule.requires_stirrer() {
        parts.push("stirrer required".to_string());
    }
    if let Some(min) = rule.min_temp {
        parts.push(format!("min {}°C", min));
    }
    if let Some(max) = rule.max_temp {
        parts.push(format!("max {}°C", max));
    }
    if let Some(ms) = rule.duration_ms {
        parts.push(format!("~{}s", ms as f64 / 1000.0));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" (Requirements: {})", parts.join(", "))
    }
}

/// `"HCl + NaOH → NaCl"`. Empty if either side is empty.
pub fn format_equation<S: AsRef<str>>(reactants: &[S], product: &str) -> String {
    let left = reactants
        .iter()
        .map(|r| r.as_ref().trim())
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>()
        .join(" + ");
    let right = product.trim();
    if left.is_empty() || right.is_empty() {
        String::new()
    } else {
        format!("{} → {}", left, right)
    }
}
