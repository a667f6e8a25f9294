//! ChemLab Headless Lab Harness
//!
//! Validates the bundled catalog data and drives the lab engine through
//! scripted scenarios and a seeded random soak. Runs entirely in-process
//! on the engine's simulated clock: no UI, no timers, no I/O.
//!
//! Usage:
//!   cargo run -p chemlab-simtest
//!   cargo run -p chemlab-simtest -- --verbose
//!   cargo run -p chemlab-simtest -- --seed 42 --steps 20000

use std::collections::{BTreeMap, BTreeSet};

use chemlab_core::engine::LabEvent;
use chemlab_core::prelude::*;
use chemlab_logic::catalog::{ChemicalCatalog, ChemicalSpec, EquipmentCatalog};
use chemlab_logic::reactions::{validate_raw_rules, RawReaction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Bundled data (same JSON the engine ships with) ─────────────────────
const CHEMICALS_JSON: &str = include_str!("../../../data/chemicals.json");
const EQUIPMENT_JSON: &str = include_str!("../../../data/equipment.json");
const REACTIONS_JSON: &str = include_str!("../../../data/reactions.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

struct Options {
    verbose: bool,
    seed: u64,
    steps: usize,
}

fn parse_options() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let value_after = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .and_then(|v| v.parse::<u64>().ok())
    };
    Options {
        verbose: args.iter().any(|a| a == "--verbose"),
        seed: value_after("--seed").unwrap_or(0xC4E3_1AB5),
        steps: value_after("--steps").map(|s| s as usize).unwrap_or(5000),
    }
}

fn main() {
    let options = parse_options();
    println!("=== ChemLab Lab Harness ===\n");

    let mut results = Vec::new();

    // 1. Catalog data validation
    results.extend(validate_catalog_data(options.verbose));

    // 2. Rule table coverage
    let Some(catalog) = load_catalog(&mut results) else {
        report(&results, options.verbose);
        return;
    };
    results.extend(validate_rule_table(&catalog, options.verbose));

    // 3. Scripted bench scenarios
    results.extend(validate_scenarios(&catalog, options.verbose));

    // 4. Save / load
    results.extend(validate_persistence(&catalog, options.verbose));

    // 5. Seeded soak
    results.extend(run_soak(&catalog, options.seed, options.steps, options.verbose));

    report(&results, options.verbose);
}

fn report(results: &[TestResult], verbose: bool) {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn load_catalog(results: &mut Vec<TestResult>) -> Option<LabCatalog> {
    match LabCatalog::from_json(CHEMICALS_JSON, EQUIPMENT_JSON, REACTIONS_JSON) {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            results.push(TestResult::new("catalog_load", false, e.to_string()));
            None
        }
    }
}

fn fresh_lab(catalog: &LabCatalog) -> LabEngine {
    LabEngine::new(catalog.clone())
}

fn find(lab: &LabEngine, query: &str) -> Option<ChemicalSpec> {
    lab.catalog().chemicals.find(query).cloned()
}

fn add_all(lab: &mut LabEngine, id: BenchId, queries: &[&str]) -> Result<(), String> {
    for q in queries {
        let spec = find(lab, q).ok_or_else(|| format!("{} not in catalog", q))?;
        lab.add_catalog_chemical(id, &spec)
            .map_err(|e| format!("adding {}: {}", q, e))?;
    }
    Ok(())
}

fn formulas(lab: &LabEngine, id: BenchId) -> Vec<String> {
    lab.contents(id).into_iter().map(|c| c.formula).collect()
}

// ── 1. Catalog Data ─────────────────────────────────────────────────────

fn validate_catalog_data(verbose: bool) -> Vec<TestResult> {
    println!("--- Catalog Data ---");
    let mut results = Vec::new();

    let chemicals: ChemicalCatalog = match serde_json::from_str(CHEMICALS_JSON) {
        Ok(c) => c,
        Err(e) => {
            results.push(TestResult::new(
                "chemicals_parse",
                false,
                format!("JSON parse error: {}", e),
            ));
            return results;
        }
    };

    results.push(TestResult::new(
        "chemicals_not_empty",
        chemicals.chemicals.len() >= 10,
        format!("{} chemicals loaded", chemicals.chemicals.len()),
    ));

    // Identifiers must be unique or rule keys become ambiguous
    let ids = chemicals.identifiers();
    let unique: BTreeSet<&String> = ids.iter().collect();
    results.push(TestResult::new(
        "chemicals_unique_ids",
        unique.len() == ids.len(),
        format!("{} identifiers, {} unique", ids.len(), unique.len()),
    ));

    let no_formula: Vec<_> = chemicals
        .chemicals
        .iter()
        .filter(|c| c.formula.trim().is_empty())
        .map(|c| c.name.as_str())
        .collect();
    results.push(TestResult::new(
        "chemicals_have_formulas",
        no_formula.is_empty(),
        if no_formula.is_empty() {
            "every chemical has a formula".to_string()
        } else {
            format!("missing formula: {}", no_formula.join(", "))
        },
    ));

    match serde_json::from_str::<EquipmentCatalog>(EQUIPMENT_JSON) {
        Ok(equipment) => {
            let vessels = equipment.equipment.iter().filter(|e| e.is_vessel()).count();
            results.push(TestResult::new(
                "equipment_has_vessels",
                vessels > 0,
                format!("{} items, {} vessels", equipment.equipment.len(), vessels),
            ));
        }
        Err(e) => results.push(TestResult::new(
            "equipment_parse",
            false,
            format!("JSON parse error: {}", e),
        )),
    }

    match serde_json::from_str::<BTreeMap<String, RawReaction>>(REACTIONS_JSON) {
        Ok(raw) => {
            let report = validate_raw_rules(raw.keys().map(String::as_str));
            results.push(TestResult::new(
                "reaction_keys_clean",
                report.is_clean(),
                format!("{:?}", report),
            ));
            let with_product = raw.values().filter(|r| r.product.is_some()).count();
            results.push(TestResult::new(
                "reactions_have_products",
                with_product > 0,
                format!("{} of {} rules name a product", with_product, raw.len()),
            ));
        }
        Err(e) => results.push(TestResult::new(
            "reactions_parse",
            false,
            format!("JSON parse error: {}", e),
        )),
    }

    if verbose {
        println!("  {} chemicals, {} identifiers", chemicals.chemicals.len(), ids.len());
    }
    results
}

// ── 2. Rule Table ───────────────────────────────────────────────────────

fn validate_rule_table(catalog: &LabCatalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Rule Table ---");
    let mut results = Vec::new();
    let ids = catalog.chemicals.identifiers();

    let mut missing = Vec::new();
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            if catalog.rules.lookup_reactants(&[b, a]).is_none() {
                missing.push(format!("{}+{}", a, b));
            }
        }
    }
    results.push(TestResult::new(
        "rules_cover_all_pairs",
        missing.is_empty(),
        if missing.is_empty() {
            format!("{} rules for {} chemicals", catalog.rules.len(), ids.len())
        } else {
            format!("{} pairs without a rule: {}", missing.len(), missing.join(", "))
        },
    ));

    let actionable = catalog.rules.actionable().count();
    results.push(TestResult::new(
        "rules_actionable",
        actionable > 0,
        format!(
            "{} actionable, {} placeholders",
            actionable,
            catalog.rules.placeholder_count()
        ),
    ));

    // Every rule's gates must be satisfiable
    let bad_range: Vec<_> = catalog
        .rules
        .iter()
        .filter(|r| matches!((r.min_temp, r.max_temp), (Some(lo), Some(hi)) if lo > hi))
        .map(|r| r.key.clone())
        .collect();
    results.push(TestResult::new(
        "rules_temperature_ranges",
        bad_range.is_empty(),
        if bad_range.is_empty() {
            "all temperature windows are non-empty".to_string()
        } else {
            format!("inverted windows: {}", bad_range.join(", "))
        },
    ));

    if verbose {
        for rule in catalog.rules.actionable() {
            println!("  {} → {}", rule.key, rule.product.as_deref().unwrap_or("?"));
        }
    }
    results
}

// ── 3. Scenarios ────────────────────────────────────────────────────────

fn validate_scenarios(catalog: &LabCatalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Bench Scenarios ---");
    let scenarios: [(&str, fn(&LabCatalog) -> Result<String, String>); 6] = [
        ("scenario_neutralization", scenario_neutralization),
        ("scenario_capacity", scenario_capacity),
        ("scenario_pause_resume", scenario_pause_resume),
        ("scenario_parallel_completions", scenario_parallel_completions),
        ("scenario_undo_redo", scenario_undo_redo),
        ("scenario_countdown", scenario_countdown),
    ];

    scenarios
        .iter()
        .map(|(name, run)| {
            let result = run(catalog);
            if verbose {
                println!("  {} done", name);
            }
            match result {
                Ok(detail) => TestResult::new(name, true, detail),
                Err(detail) => TestResult::new(name, false, detail),
            }
        })
        .collect()
}

fn scenario_neutralization(catalog: &LabCatalog) -> Result<String, String> {
    let mut lab = fresh_lab(catalog);
    add_all(&mut lab, BenchId::FLASK, &["HCl", "NaOH"])?;
    let duration = lab.start_reaction(BenchId::FLASK).map_err(|e| e.to_string())?;

    let early = lab.advance(duration - 1);
    if !early.is_empty() {
        return Err(format!("completed early: {:?}", early));
    }
    let events = lab.advance(1);
    let expected = LabEvent::ReactionCompleted {
        target: BenchId::FLASK,
        product: Some("NaCl".to_string()),
    };
    if events != vec![expected] {
        return Err(format!("unexpected events {:?}", events));
    }
    let contents = lab.contents(BenchId::FLASK);
    match contents.as_slice() {
        [unit] if unit.formula == "NaCl" => Ok(format!(
            "NaCl ({} mL) after {} ms",
            unit.amount, duration
        )),
        other => Err(format!("flask holds {:?}", other)),
    }
}

fn scenario_capacity(catalog: &LabCatalog) -> Result<String, String> {
    let mut lab = fresh_lab(catalog);
    add_all(&mut lab, BenchId::FLASK, &["HCl", "NaOH", "H2O"])?;
    let before = formulas(&lab, BenchId::FLASK);
    let extra = find(&lab, "KMnO4").ok_or("KMnO4 not in catalog")?;
    match lab.add_catalog_chemical(BenchId::FLASK, &extra) {
        Err(LabError::CapacityExceeded { .. }) => {}
        other => return Err(format!("fourth add returned {:?}", other)),
    }
    if formulas(&lab, BenchId::FLASK) != before {
        return Err("contents changed after refused add".to_string());
    }
    Ok(format!("flask capped at {} units", before.len()))
}

fn scenario_pause_resume(catalog: &LabCatalog) -> Result<String, String> {
    let mut lab = fresh_lab(catalog);
    add_all(&mut lab, BenchId::FLASK, &["HCl", "NaOH"])?;
    let duration = lab.start_reaction(BenchId::FLASK).map_err(|e| e.to_string())?;

    lab.advance(duration / 2);
    lab.set_paused(true);
    let frozen = lab.advance(duration * 10);
    if !frozen.is_empty() {
        return Err(format!("events while paused: {:?}", frozen));
    }
    lab.set_paused(false);
    let remaining = duration - duration / 2;
    if !lab.advance(remaining - 1).is_empty() {
        return Err("completed before remaining time elapsed".to_string());
    }
    if lab.advance(1).len() != 1 {
        return Err("no completion after resume".to_string());
    }
    Ok(format!("{} ms remained after pause", remaining))
}

fn scenario_parallel_completions(catalog: &LabCatalog) -> Result<String, String> {
    let mut lab = fresh_lab(catalog);
    let beaker = lab.place_apparatus("beaker", 200.0, 100.0);
    add_all(&mut lab, BenchId::FLASK, &["HCl", "NaOH"])?;
    add_all(&mut lab, beaker, &["AgNO3", "NaCl"])?;
    lab.start_reaction(BenchId::FLASK).map_err(|e| e.to_string())?;
    lab.start_reaction(beaker).map_err(|e| e.to_string())?;

    let order: Vec<BenchId> = lab
        .advance(60_000)
        .into_iter()
        .filter_map(|e| match e {
            LabEvent::ReactionCompleted { target, .. } => Some(target),
            _ => None,
        })
        .collect();
    if order.len() != 2 {
        return Err(format!("expected 2 completions, got {:?}", order));
    }
    if !lab.reactions_in_flight().is_empty() {
        return Err("reactions still in flight".to_string());
    }
    Ok(format!("completed in order {:?}", order))
}

fn scenario_undo_redo(catalog: &LabCatalog) -> Result<String, String> {
    let mut lab = fresh_lab(catalog);
    add_all(&mut lab, BenchId::FLASK, &["HCl"])?;
    let one = lab.snapshot();
    add_all(&mut lab, BenchId::FLASK, &["NaOH"])?;
    let two = lab.snapshot();

    if !lab.undo() {
        return Err("nothing to undo".to_string());
    }
    if lab.snapshot() != one {
        return Err("undo did not restore the earlier bench".to_string());
    }
    if !lab.redo() {
        return Err("nothing to redo".to_string());
    }
    if lab.snapshot() != two {
        return Err("redo did not restore the later bench".to_string());
    }
    Ok("undo/redo restore exact snapshots".to_string())
}

fn scenario_countdown(catalog: &LabCatalog) -> Result<String, String> {
    let mut lab = fresh_lab(catalog);
    add_all(&mut lab, BenchId::FLASK, &["HCl", "NaOH"])?;
    let seconds = lab.start_countdown(0.05).map_err(|e| e.to_string())?;
    let events = lab.advance(u64::from(seconds) * 1000);

    let finished = events.iter().any(|e| *e == LabEvent::CountdownFinished);
    let started = events
        .iter()
        .any(|e| matches!(e, LabEvent::ReactionStarted { target, .. } if *target == BenchId::FLASK));
    if !finished || !started {
        return Err(format!("countdown events {:?}", events));
    }
    Ok(format!("{}s countdown started the flask reaction", seconds))
}

// ── 4. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(catalog: &LabCatalog, _verbose: bool) -> Vec<TestResult> {
    println!("--- Save / Load ---");
    let mut results = Vec::new();

    let mut lab = fresh_lab(catalog);
    let beaker = lab.place_apparatus("beaker", 120.0, 80.0);
    if let Err(e) = add_all(&mut lab, beaker, &["HCl", "NaOH"]) {
        results.push(TestResult::new("persistence_setup", false, e));
        return results;
    }
    let _ = lab.start_reaction(beaker);
    lab.advance(500);
    let before = lab.snapshot();

    let mut bytes = Vec::new();
    let binary = lab.save(&mut bytes).and_then(|_| {
        let mut other = fresh_lab(catalog);
        other.load(bytes.as_slice())?;
        Ok(other.snapshot())
    });
    results.push(match binary {
        Ok(after) => TestResult::new(
            "save_load_binary",
            after == before,
            format!("{} bytes", bytes.len()),
        ),
        Err(e) => TestResult::new("save_load_binary", false, e.to_string()),
    });

    let json = lab.to_json().and_then(|text| {
        let mut other = fresh_lab(catalog);
        other.load_json(&text)?;
        Ok((text.len(), other.snapshot()))
    });
    results.push(match json {
        Ok((len, after)) => TestResult::new(
            "save_load_json",
            after == before,
            format!("{} chars", len),
        ),
        Err(e) => TestResult::new("save_load_json", false, e.to_string()),
    });

    results
}

// ── 5. Soak ─────────────────────────────────────────────────────────────

fn check_invariants(lab: &LabEngine) -> Result<(), String> {
    if !lab.bench().contains(BenchId::FLASK) {
        return Err("flask gone".to_string());
    }
    let capacity = lab.config().container_capacity;
    let mut reacting = BTreeSet::new();
    for id in lab.bench().container_ids() {
        let Some(container) = lab.container(id) else {
            return Err(format!("{} listed but missing", id));
        };
        if container.contents.len() > capacity {
            return Err(format!("{} holds {}", id, container.contents.len()));
        }
        if container.is_reacting {
            reacting.insert(id);
        }
    }
    let scheduled: BTreeSet<BenchId> = lab
        .reactions_in_flight()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    if reacting != scheduled {
        return Err(format!("reacting {:?} vs scheduled {:?}", reacting, scheduled));
    }
    if lab.is_paused() {
        if let Some(active) = lab.active_reaction() {
            if active.end_at.is_some() {
                return Err("reaction timer running while paused".to_string());
            }
        }
    }
    Ok(())
}

fn run_soak(catalog: &LabCatalog, seed: u64, steps: usize, verbose: bool) -> Vec<TestResult> {
    println!("--- Soak (seed {:#x}, {} steps) ---", seed, steps);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lab = fresh_lab(catalog);
    let chemicals = catalog.chemicals.chemicals.clone();
    let kinds = ["beaker", "test_tube", "stirrer", "burner", "retort_stand"];

    let mut completions = 0usize;
    let mut rejections = 0usize;
    let mut failure = None;

    for step in 0..steps {
        let containers = lab.bench().container_ids();
        let ids = lab.bench().ids();
        let container = containers[rng.gen_range(0..containers.len())];

        let outcome = match rng.gen_range(0..14) {
            0..=3 => {
                let chem = &chemicals[rng.gen_range(0..chemicals.len())];
                lab.add_catalog_chemical(container, chem)
            }
            4 | 5 => lab.start_reaction(container).map(|_| ()),
            6 => {
                let other = containers[rng.gen_range(0..containers.len())];
                lab.transfer(container, other)
            }
            7 => lab.clear_container(container),
            8 => {
                let kind = kinds[rng.gen_range(0..kinds.len())];
                lab.place_apparatus(kind, rng.gen_range(0.0..400.0), rng.gen_range(0.0..300.0));
                Ok(())
            }
            9 => lab.remove_apparatus(ids[rng.gen_range(0..ids.len())]),
            10 => {
                let paused = !lab.is_paused();
                lab.set_paused(paused);
                Ok(())
            }
            11 => lab.set_temperature(rng.gen_range(0.0..150.0)),
            12 => {
                if rng.gen_bool(0.5) {
                    lab.undo();
                } else {
                    lab.redo();
                }
                Ok(())
            }
            _ => lab.toggle_burner().map(|_| ()),
        };
        if outcome.is_err() {
            rejections += 1;
        }

        completions += lab
            .advance(rng.gen_range(0..2000))
            .iter()
            .filter(|e| matches!(e, LabEvent::ReactionCompleted { .. }))
            .count();

        if let Err(e) = check_invariants(&lab) {
            failure = Some(format!("step {}: {}", step, e));
            break;
        }
    }

    if verbose {
        println!(
            "  {} completions, {} rejected operations, {} bench items",
            completions,
            rejections,
            lab.bench().item_count()
        );
    }

    vec![TestResult::new(
        "soak_invariants",
        failure.is_none(),
        failure.unwrap_or_else(|| {
            format!(
                "{} steps, {} completions, {} rejections",
                steps, completions, rejections
            )
        }),
    )]
}
