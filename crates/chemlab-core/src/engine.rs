//! Lab engine - main entry point for running a lab session
//!
//! [`LabEngine`] owns the bench, the reaction scheduler, the countdown,
//! the observation log and the undo history. Every mutation goes through
//! one of its methods; time only moves through [`LabEngine::advance`].

use std::io::{Read, Write};

use chemlab_logic::catalog::{ChemicalSpec, ChemicalType};
use chemlab_logic::config::LabConfig;
use chemlab_logic::constants::apparatus;
use chemlab_logic::hazard::{hazard_summary, HazardSummary};
use chemlab_logic::observations::ObservationKind;
use chemlab_logic::reactions::{format_equation, requirement_hint, ReactionDescriptor};
use chemlab_logic::timing::{
    countdown_seconds, format_countdown, scaled_duration_ms, tick_interval_with_floor,
};
use serde::{Deserialize, Serialize};

use crate::bench::Bench;
use crate::catalog::LabCatalog;
use crate::components::*;
use crate::error::LabError;
use crate::persistence::{self, LabSnapshot, ReactionTiming, SaveError, SAVE_VERSION};
use crate::systems::*;

/// Bench-wide settings and capability flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabSettings {
    pub burner_on: bool,
    /// Burner setting (°C).
    pub temperature: f64,
    pub sim_speed: f64,
    pub paused: bool,
    /// Dose for each addition (mL).
    pub chemical_amount: f64,
    pub stirrer: bool,
    pub condenser: bool,
    pub stand: bool,
    /// Reaction target chosen by the user; `None` means the flask.
    pub selected: Option<BenchId>,
}

impl LabSettings {
    /// Settings of a fresh bench
    pub fn initial(config: &LabConfig) -> Self {
        Self {
            burner_on: false,
            temperature: config.default_temperature,
            sim_speed: config.default_sim_speed,
            paused: false,
            chemical_amount: config.default_chemical_amount,
            stirrer: false,
            condenser: false,
            stand: false,
            selected: None,
        }
    }
}

/// Something that happened while the clock advanced.
#[derive(Debug, Clone, PartialEq)]
pub enum LabEvent {
    ReactionCompleted {
        target: BenchId,
        /// Product now in the container, when the contents changed.
        product: Option<String>,
    },
    ReactionStarted {
        target: BenchId,
        duration_ms: u64,
    },
    /// The countdown tried to start the flask reaction and a guard refused.
    ReactionRejected {
        target: BenchId,
        error: LabError,
    },
    CountdownTick {
        remaining_secs: u32,
    },
    CountdownFinished,
}

/// The most recently scheduled reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveReaction {
    pub target: BenchId,
    /// Clock time of completion; `None` while paused.
    pub end_at: Option<u64>,
    pub remaining_ms: u64,
}

/// One lab session.
pub struct LabEngine {
    config: LabConfig,
    catalog: LabCatalog,
    bench: Bench,
    settings: LabSettings,
    scheduler: ReactionScheduler,
    countdown: Option<Countdown>,
    observations: ObservationLog,
    history: History<LabSnapshot>,
    /// Simulation clock (ms).
    now_ms: u64,
}

impl LabEngine {
    /// Create a lab with an empty flask and default settings
    pub fn new(catalog: LabCatalog) -> Self {
        Self::with_config(catalog, LabConfig::default())
    }

    /// Create a lab with custom limits and defaults
    pub fn with_config(catalog: LabCatalog, config: LabConfig) -> Self {
        Self {
            bench: Bench::new(config.container_capacity),
            settings: LabSettings::initial(&config),
            scheduler: ReactionScheduler::new(),
            countdown: None,
            observations: ObservationLog::new(config.observation_capacity),
            history: History::new(config.history_limit),
            now_ms: 0,
            catalog,
            config,
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Limits and defaults this lab runs with
    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Chemicals, equipment and reaction rules
    pub fn catalog(&self) -> &LabCatalog {
        &self.catalog
    }

    /// Read access to the bench items
    pub fn bench(&self) -> &Bench {
        &self.bench
    }

    /// Current burner, speed and capability settings
    pub fn settings(&self) -> &LabSettings {
        &self.settings
    }

    /// Simulation clock in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Whether all timers are suspended
    pub fn is_paused(&self) -> bool {
        self.settings.paused
    }

    /// Copy of a container's current state.
    pub fn container(&self, id: BenchId) -> Option<Container> {
        self.bench.container(id).map(|c| (*c).clone())
    }

    /// Units in a container, oldest first (empty when unknown)
    pub fn contents(&self, id: BenchId) -> Vec<ChemicalUnit> {
        self.container(id).map(|c| c.contents).unwrap_or_default()
    }

    /// The running or paused countdown
    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    /// `m:ss` of the running countdown.
    pub fn countdown_display(&self) -> Option<String> {
        self.countdown
            .as_ref()
            .map(|c| format_countdown(c.remaining_secs))
    }

    /// Observation log, newest first
    pub fn observations(&self) -> &ObservationLog {
        &self.observations
    }

    /// Whether an undo step is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether a redo step is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Container reactions are started in: the selection, else the flask.
    pub fn reaction_target(&self) -> BenchId {
        self.settings
            .selected
            .filter(|id| self.bench.container(*id).is_some())
            .unwrap_or(BenchId::FLASK)
    }

    /// The most recently started reaction still in flight
    pub fn active_reaction(&self) -> Option<ActiveReaction> {
        self.scheduler.most_recent().map(|entry| ActiveReaction {
            target: entry.target,
            end_at: entry.due_at,
            remaining_ms: entry.remaining_at(self.now_ms),
        })
    }

    /// `(target, remaining ms)` for every in-flight reaction, oldest first.
    pub fn reactions_in_flight(&self) -> Vec<(BenchId, u64)> {
        self.scheduler.remaining(self.now_ms)
    }

    /// Hazard badge for the reaction target's contents.
    pub fn hazard(&self) -> HazardSummary {
        let types: Vec<ChemicalType> = self
            .contents(self.reaction_target())
            .iter()
            .map(|c| c.chem_type)
            .collect();
        hazard_summary(types)
    }

    /// Rule currently matched by a container, actionable or not.
    pub fn matched_rule(&self, id: BenchId) -> Option<&ReactionDescriptor> {
        let key = {
            let container = self.bench.container(id)?;
            if container.contents.len() < 2 {
                return None;
            }
            container.reaction_key()
        };
        self.catalog.rules.lookup(&key)
    }

    /// A dose of a catalog chemical at the current amount.
    pub fn dose(&self, spec: &ChemicalSpec) -> ChemicalUnit {
        ChemicalUnit::from_spec(spec, self.settings.chemical_amount)
    }

    // ── Contents ────────────────────────────────────────────────────────

    /// Add one unit to a container and report what the mixture will do
    pub fn add_chemical(&mut self, id: BenchId, unit: ChemicalUnit) -> Result<(), LabError> {
        if self.settings.paused {
            return Err(self.reject(LabError::SimulationPaused));
        }
        if let Err(e) = self.bench.check_can_add(id) {
            return Err(self.reject(e));
        }

        self.record();
        let text = if unit.formula.trim().is_empty() {
            format!("Added {} to {}", unit.name, id)
        } else {
            format!("Added {} ({}) to {}", unit.name, unit.formula, id)
        };
        self.bench.add_chemical(id, unit, &self.catalog.rules)?;
        self.observe(ObservationKind::Info, text);
        self.report_match(id);
        Ok(())
    }

    /// Add one dose of a catalog chemical.
    pub fn add_catalog_chemical(&mut self, id: BenchId, spec: &ChemicalSpec) -> Result<(), LabError> {
        let unit = self.dose(spec);
        self.add_chemical(id, unit)
    }

    /// Pour everything in `source` into `target`.
    pub fn transfer(&mut self, source: BenchId, target: BenchId) -> Result<(), LabError> {
        if source == target {
            return Err(self.reject(LabError::InvalidTransfer));
        }
        if self.settings.paused {
            return Err(self.reject(LabError::SimulationPaused));
        }
        if let Err(e) = self.check_transfer(source, target) {
            return Err(self.reject(e));
        }

        self.record();
        let units = match self.bench.container_mut(source) {
            Some(container) => {
                container.pending_reaction = None;
                std::mem::take(&mut container.contents)
            }
            None => return Err(LabError::UnknownContainer { id: source }),
        };
        let poured = units.len();
        if let Some(container) = self.bench.container_mut(target) {
            container.contents.extend(units);
            container.refresh_pending(&self.catalog.rules);
        }

        self.observe(
            ObservationKind::Info,
            format!("Poured {} chemical(s) from {} into {}", poured, source, target),
        );
        self.report_match(target);
        Ok(())
    }

    fn check_transfer(&self, source: BenchId, target: BenchId) -> Result<(), LabError> {
        let src = (*self.bench.require_container(source)?).clone();
        let dst = (*self.bench.require_container(target)?).clone();

        for (id, container) in [(source, &src), (target, &dst)] {
            if !self.config.is_pourable(container.kind.name()) {
                return Err(LabError::UnsupportedVessel {
                    id,
                    kind: container.kind.name().to_string(),
                });
            }
        }
        for (id, container) in [(source, &src), (target, &dst)] {
            if container.is_reacting {
                return Err(LabError::ReactionInProgress { id });
            }
        }
        if src.contents.is_empty() {
            return Err(LabError::EmptySource { id: source });
        }
        if src.contents.len() + dst.contents.len() > self.config.container_capacity {
            return Err(LabError::CapacityExceeded {
                id: target,
                capacity: self.config.container_capacity,
            });
        }
        Ok(())
    }

    /// Empty a container that is not reacting
    pub fn clear_container(&mut self, id: BenchId) -> Result<(), LabError> {
        let reacting = self.bench.container(id).map(|c| c.is_reacting);
        let Some(reacting) = reacting else {
            return Err(self.reject(LabError::UnknownContainer { id }));
        };
        if reacting {
            return Err(self.reject(LabError::ReactionInProgress { id }));
        }
        self.record();
        self.bench.clear(id)?;
        self.observe(ObservationKind::Info, format!("Emptied {}", id));
        Ok(())
    }

    // ── Reactions ───────────────────────────────────────────────────────

    /// Start the reaction in `id`. Returns the scheduled duration (ms).
    pub fn start_reaction(&mut self, id: BenchId) -> Result<u64, LabError> {
        self.begin_reaction(id, true)
    }

    /// Start the reaction in the selected container, else the flask.
    pub fn start_reaction_for_target(&mut self) -> Result<u64, LabError> {
        let target = self.reaction_target();
        self.start_reaction(target)
    }

    fn begin_reaction(&mut self, id: BenchId, record: bool) -> Result<u64, LabError> {
        if self.settings.paused {
            return Err(self.reject(LabError::SimulationPaused));
        }
        let state = self
            .bench
            .container(id)
            .map(|c| (c.contents.len(), c.is_reacting, c.pending_reaction.clone()));
        let Some((present, reacting, pending)) = state else {
            return Err(self.reject(LabError::UnknownContainer { id }));
        };
        if present < 2 {
            return Err(self.reject(LabError::InsufficientReactants { id, present }));
        }
        if reacting {
            return Err(self.reject(LabError::ReactionInProgress { id }));
        }
        if let Some(rule) = &pending {
            if let Err(e) = self.check_conditions(rule) {
                return Err(self.reject(e));
            }
        }

        if record {
            self.record();
        }
        if let Some(container) = self.bench.container_mut(id) {
            container.is_reacting = true;
        }
        let duration = self.reaction_duration(pending.as_ref());
        self.scheduler.schedule(id, duration, self.now_ms);

        log::info!("Reaction started in {} ({} ms)", id, duration);
        self.observe(ObservationKind::Info, format!("Reaction started in {}", id));
        Ok(duration)
    }

    fn check_conditions(&self, rule: &ReactionDescriptor) -> Result<(), LabError> {
        for requirement in &rule.requires {
            if !self.has_capability(requirement) {
                return Err(LabError::MissingRequirement {
                    requirement: requirement.clone(),
                });
            }
        }
        if rule.is_endothermic() && !self.settings.burner_on {
            return Err(LabError::MissingHeat);
        }
        if !rule.accepts_temperature(self.settings.temperature) {
            return Err(LabError::TemperatureOutOfRange {
                temperature: self.settings.temperature,
                min: rule.min_temp,
                max: rule.max_temp,
            });
        }
        Ok(())
    }

    fn has_capability(&self, tag: &str) -> bool {
        match tag {
            apparatus::STIRRER => self.settings.stirrer,
            apparatus::CONDENSER => self.settings.condenser,
            apparatus::STAND | apparatus::RETORT_STAND => self.settings.stand,
            apparatus::BURNER | "heat" => self.settings.burner_on,
            other => self.bench.count_kind(other) > 0,
        }
    }

    fn reaction_duration(&self, rule: Option<&ReactionDescriptor>) -> u64 {
        scaled_duration_ms(
            rule.and_then(|r| r.duration_ms),
            self.settings.sim_speed,
            self.config.default_reaction_ms,
            self.config.min_reaction_ms,
            self.config.speed_floor(),
        )
    }

    fn tick_ms(&self) -> u64 {
        tick_interval_with_floor(self.settings.sim_speed, self.config.speed_floor())
    }

    /// Deliver a fired completion. Stale ones (target gone or no longer
    /// reacting) are dropped.
    fn complete_reaction(&mut self, target: BenchId) -> Option<LabEvent> {
        let fallback_amount = self.config.default_chemical_amount;
        let Some(container) = self.bench.container_mut(target) else {
            log::debug!("Completion for missing {} ignored", target);
            return None;
        };
        if !container.is_reacting {
            log::debug!("Completion for idle {} ignored", target);
            return None;
        }

        container.is_reacting = false;
        let rule = container.pending_reaction.take();
        let labels: Vec<String> = container
            .contents
            .iter()
            .map(|c| c.label().to_string())
            .collect();

        let mut product_in_container = None;
        if let Some(rule) = rule.as_ref().filter(|r| r.shows_visible_change()) {
            let total = container.total_amount();
            let amount = if total > 0.0 { total } else { fallback_amount };
            let product = rule.product.clone();
            let color = rule.color.clone().unwrap_or_default();
            container.contents = vec![ChemicalUnit::new(
                product.as_deref().unwrap_or("Product"),
                product.as_deref().unwrap_or(""),
                &color,
                ChemicalType::Unknown,
                amount,
            )];
            product_in_container = Some(product.unwrap_or_else(|| "Product".to_string()));
        }

        match &rule {
            Some(rule) => {
                self.observe(
                    ObservationKind::Success,
                    format!("✓ {}", rule.completion_summary()),
                );
                let equation = format_equation(&labels, rule.product.as_deref().unwrap_or(""));
                if !equation.is_empty() {
                    self.observe(ObservationKind::Info, format!("Reaction: {}", equation));
                }
            }
            None => self.observe(ObservationKind::Info, "No significant reaction observed"),
        }
        log::info!("Reaction in {} complete", target);

        Some(LabEvent::ReactionCompleted {
            target,
            product: product_in_container,
        })
    }

    // ── Apparatus ───────────────────────────────────────────────────────

    /// Whether placing `kind` creates a container.
    pub fn is_vessel(&self, kind: &str) -> bool {
        self.catalog.equipment.marks_vessel(kind) == Some(true) || self.config.is_vessel_kind(kind)
    }

    /// Place apparatus at a grid-snapped position.
    pub fn place_apparatus(&mut self, kind: &str, x: f32, y: f32) -> BenchId {
        self.record();
        let position = BenchPosition::snapped(x, y);
        if self.is_vessel(kind) {
            let id = self.bench.create_container(kind, position);
            self.observe(
                ObservationKind::Info,
                format!("Placed {} ({}) - can hold chemicals", kind, id),
            );
            return id;
        }
        let id = self.bench.place_apparatus(kind, position);
        self.enable_capability(kind);
        self.observe(ObservationKind::Info, format!("Placed {} on the bench", kind));
        id
    }

    /// Remove a placed item. Its scheduled completion, if any, is
    /// cancelled first.
    pub fn remove_apparatus(&mut self, id: BenchId) -> Result<(), LabError> {
        if id.is_flask() {
            return Err(self.reject(LabError::PermanentFixture));
        }
        if !self.bench.contains(id) {
            return Err(self.reject(LabError::UnknownContainer { id }));
        }

        self.record();
        let kind = self.bench.apparatus_kind(id).unwrap_or_default();
        if self.scheduler.cancel(id) {
            log::debug!("Cancelled reaction in removed {}", id);
        }
        self.bench.destroy(id);
        if self.settings.selected == Some(id) {
            self.settings.selected = None;
        }
        self.recompute_capabilities();
        self.observe(ObservationKind::Info, format!("Removed {} ({})", kind, id));
        Ok(())
    }

    /// Move a bench item to a grid-snapped position
    pub fn move_apparatus(&mut self, id: BenchId, x: f32, y: f32) -> bool {
        self.bench.move_item(id, x, y)
    }

    fn enable_capability(&mut self, kind: &str) {
        match kind {
            apparatus::STIRRER => self.settings.stirrer = true,
            apparatus::CONDENSER => self.settings.condenser = true,
            apparatus::STAND | apparatus::RETORT_STAND => self.settings.stand = true,
            _ => {}
        }
    }

    fn recompute_capabilities(&mut self) {
        self.settings.stirrer = self.bench.count_kind(apparatus::STIRRER) > 0;
        self.settings.condenser = self.bench.count_kind(apparatus::CONDENSER) > 0;
        self.settings.stand = self.bench.count_kind(apparatus::STAND) > 0
            || self.bench.count_kind(apparatus::RETORT_STAND) > 0;
    }

    /// Operate a piece of equipment from the toolbar. Only the stirrer,
    /// condenser, stand and burner change the lab; other tools just log.
    pub fn use_equipment(&mut self, kind: &str) -> Result<(), LabError> {
        if kind == apparatus::BURNER && self.settings.paused {
            return Err(self.reject(LabError::SimulationPaused));
        }
        match kind {
            apparatus::STIRRER => {
                self.record();
                self.settings.stirrer = true;
                self.observe(ObservationKind::Info, "Stirring the mixture...");
            }
            apparatus::CONDENSER => {
                self.record();
                self.settings.condenser = true;
                self.observe(
                    ObservationKind::Info,
                    "Condenser attached - will reduce vapor loss",
                );
            }
            apparatus::STAND | apparatus::RETORT_STAND => {
                self.record();
                self.settings.stand = true;
                self.observe(
                    ObservationKind::Info,
                    "Retort stand placed - can support apparatus",
                );
            }
            apparatus::BURNER => {
                self.record();
                if self.bench.count_kind(apparatus::BURNER) == 0 {
                    let id = self
                        .bench
                        .place_apparatus(apparatus::BURNER, BenchPosition::default());
                    log::debug!("Burner auto-placed as {}", id);
                }
                let on = !self.settings.burner_on;
                self.apply_burner(on);
            }
            "pipette" => {
                self.observe(ObservationKind::Info, "Using pipette to measure 5mL of solution")
            }
            other if self.is_vessel(other) => self.observe(
                ObservationKind::Info,
                format!("Placed {} - can be moved to bench", other),
            ),
            other => self.observe(ObservationKind::Info, format!("Used {}", other)),
        }
        Ok(())
    }

    // ── Settings ────────────────────────────────────────────────────────

    /// Flip the burner. Returns the new state.
    pub fn toggle_burner(&mut self) -> Result<bool, LabError> {
        let on = !self.settings.burner_on;
        self.set_burner(on)?;
        Ok(on)
    }

    /// Turn the burner on or off
    pub fn set_burner(&mut self, on: bool) -> Result<(), LabError> {
        if self.settings.paused {
            return Err(self.reject(LabError::SimulationPaused));
        }
        self.record();
        self.apply_burner(on);
        Ok(())
    }

    fn apply_burner(&mut self, on: bool) {
        self.settings.burner_on = on;
        if on {
            self.observe(ObservationKind::Warning, "Burner turned ON");
        } else {
            self.settings.temperature = self.config.default_temperature;
            self.observe(ObservationKind::Info, "Burner turned OFF");
        }
    }

    /// Set the bench temperature (°C)
    pub fn set_temperature(&mut self, celsius: f64) -> Result<(), LabError> {
        if !celsius.is_finite() {
            return Err(self.reject(LabError::InvalidSetting {
                name: "temperature",
            }));
        }
        self.record();
        self.settings.temperature = celsius;
        self.observe(
            ObservationKind::Info,
            format!("Temperature adjusted to {}°C", celsius),
        );
        Ok(())
    }

    /// Change the simulation speed. Reactions already running keep their
    /// schedule; the countdown restarts its tick at the new rate.
    pub fn set_sim_speed(&mut self, speed: f64) -> Result<(), LabError> {
        if !speed.is_finite() {
            return Err(self.reject(LabError::InvalidSetting { name: "sim_speed" }));
        }
        self.settings.sim_speed = self.config.clamp_speed(speed);
        let tick_ms = self.tick_ms();
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.set_tick_ms(tick_ms, self.now_ms);
        }
        Ok(())
    }

    /// Set the dose per addition. Non-positive amounts fall back to the
    /// default.
    pub fn set_chemical_amount(&mut self, ml: f64) -> Result<(), LabError> {
        if !ml.is_finite() {
            return Err(self.reject(LabError::InvalidSetting {
                name: "chemical_amount",
            }));
        }
        self.settings.chemical_amount = if ml > 0.0 {
            ml
        } else {
            self.config.default_chemical_amount
        };
        Ok(())
    }

    /// Choose the reaction target. `None` or the flask selects the flask.
    pub fn select_container(&mut self, id: Option<BenchId>) -> Result<(), LabError> {
        let id = id.filter(|id| !id.is_flask());
        if let Some(id) = id {
            let kind = self.bench.container(id).map(|c| c.kind.name().to_string());
            let Some(kind) = kind else {
                return Err(self.reject(LabError::UnknownContainer { id }));
            };
            self.observe(
                ObservationKind::Info,
                format!("Selected {} ({}) for reactions", kind, id),
            );
        }
        self.settings.selected = id;
        Ok(())
    }

    /// Suspend or resume every timer.
    pub fn set_paused(&mut self, paused: bool) {
        if self.settings.paused == paused {
            return;
        }
        self.settings.paused = paused;
        if paused {
            self.scheduler.pause(self.now_ms);
            if let Some(countdown) = self.countdown.as_mut() {
                countdown.pause(self.now_ms);
            }
            self.observe(ObservationKind::Info, "Simulation paused");
        } else {
            self.scheduler.resume(self.now_ms);
            if let Some(countdown) = self.countdown.as_mut() {
                countdown.resume(self.now_ms);
            }
            self.observe(ObservationKind::Info, "Simulation resumed");
        }
    }

    /// Start (or restart) the countdown. Returns its length in seconds.
    pub fn start_countdown(&mut self, minutes: f64) -> Result<u32, LabError> {
        if self.settings.paused {
            return Err(self.reject(LabError::SimulationPaused));
        }
        self.record();
        let seconds = countdown_seconds(minutes);
        self.countdown = Some(Countdown::start(seconds, self.tick_ms(), self.now_ms));
        self.observe(
            ObservationKind::Info,
            format!("Timer started: {}", format_countdown(seconds)),
        );
        Ok(seconds)
    }

    fn tick_countdown(&mut self, events: &mut Vec<LabEvent>) {
        let Some(countdown) = self.countdown.as_mut() else {
            return;
        };
        match countdown.tick() {
            CountdownTick::Running(remaining_secs) => {
                events.push(LabEvent::CountdownTick { remaining_secs });
            }
            CountdownTick::Finished => {
                self.countdown = None;
                self.observe(ObservationKind::Success, "Timer completed");
                events.push(LabEvent::CountdownFinished);
                if self.contents(BenchId::FLASK).len() >= 2 {
                    let target = BenchId::FLASK;
                    events.push(match self.begin_reaction(target, false) {
                        Ok(duration_ms) => LabEvent::ReactionStarted {
                            target,
                            duration_ms,
                        },
                        Err(error) => LabEvent::ReactionRejected { target, error },
                    });
                }
            }
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Back to a fresh bench. The dose setting survives.
    pub fn reset(&mut self) {
        self.record();
        self.scheduler.reset();
        self.countdown = None;
        self.bench.clear_placed();
        let chemical_amount = self.settings.chemical_amount;
        self.settings = LabSettings {
            chemical_amount,
            ..LabSettings::initial(&self.config)
        };
        log::info!("Lab reset");
        self.observe(ObservationKind::Info, "Lab reset");
    }

    /// Move the clock forward, firing completions and countdown ticks in
    /// time order.
    pub fn advance(&mut self, delta_ms: u64) -> Vec<LabEvent> {
        let end = self.now_ms.saturating_add(delta_ms);
        let mut events = Vec::new();

        loop {
            let next_reaction = self.scheduler.next_due();
            let next_tick = self.countdown.as_ref().and_then(|c| c.next_tick_at);
            let Some(next) = [next_reaction, next_tick].into_iter().flatten().min() else {
                break;
            };
            if next > end {
                break;
            }
            self.now_ms = self.now_ms.max(next);

            if next_reaction == Some(next) {
                let Some(entry) = self.scheduler.pop_due(self.now_ms) else {
                    break;
                };
                if let Some(event) = self.complete_reaction(entry.target) {
                    events.push(event);
                }
            } else {
                self.tick_countdown(&mut events);
            }
        }

        self.now_ms = end;
        events
    }

    // ── History ─────────────────────────────────────────────────────────

    fn record(&mut self) {
        let snapshot = self.snapshot();
        self.history.push(snapshot);
    }

    /// Step back one snapshot. Returns `false` when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(previous) => {
                self.apply_snapshot(previous);
                self.observe(ObservationKind::Info, "Undo");
                true
            }
            None => false,
        }
    }

    /// Reapply an undone snapshot. Returns `false` when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(next) => {
                self.apply_snapshot(next);
                self.observe(ObservationKind::Info, "Redo");
                true
            }
            None => false,
        }
    }

    /// Deep copy of the lab with timers as remaining durations.
    pub fn snapshot(&self) -> LabSnapshot {
        LabSnapshot {
            version: SAVE_VERSION,
            items: self.bench.items(),
            next_id: self.bench.next_id(),
            settings: self.settings.clone(),
            reactions: self
                .scheduler
                .remaining(self.now_ms)
                .into_iter()
                .filter(|(target, _)| self.bench.contains(*target))
                .map(|(target, remaining_ms)| ReactionTiming {
                    target,
                    remaining_ms,
                })
                .collect(),
            countdown: self.countdown.as_ref().map(|c| {
                Countdown::suspended(c.remaining_secs, c.tick_ms, c.until_next_at(self.now_ms))
            }),
        }
    }

    /// Replace the lab with a snapshot without touching the undo history.
    pub fn restore(&mut self, snapshot: LabSnapshot) {
        self.apply_snapshot(snapshot);
    }

    fn apply_snapshot(&mut self, snapshot: LabSnapshot) {
        self.history.begin_restore();

        self.scheduler.reset();
        self.bench = Bench::from_items(
            snapshot.items,
            snapshot.next_id,
            self.config.container_capacity,
        );
        self.settings = snapshot.settings;
        if self.settings.paused {
            self.scheduler.pause(self.now_ms);
        }

        for timing in &snapshot.reactions {
            let reacting = self
                .bench
                .container(timing.target)
                .map(|c| c.is_reacting)
                .unwrap_or(false);
            if reacting {
                self.scheduler
                    .schedule(timing.target, timing.remaining_ms, self.now_ms);
            }
        }
        // reacting containers the snapshot carries no timing for
        for id in self.bench.reacting_ids() {
            if !self.scheduler.is_scheduled(id) {
                let pending = self.bench.container(id).and_then(|c| c.pending_reaction.clone());
                let duration = self.reaction_duration(pending.as_ref());
                self.scheduler.schedule(id, duration, self.now_ms);
            }
        }

        self.countdown = snapshot.countdown.map(|c| {
            let mut countdown =
                Countdown::suspended(c.remaining_secs, c.tick_ms, c.until_next_tick_ms);
            if !self.settings.paused {
                countdown.resume(self.now_ms);
            }
            countdown
        });

        self.history.end_restore();
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Save the session in bincode form
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_lab(writer, &self.snapshot())
    }

    /// Load a bincode session
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let snapshot = persistence::load_lab(reader)?;
        self.restore(snapshot);
        log::info!("Lab session loaded");
        Ok(())
    }

    /// Save the session as pretty JSON
    pub fn to_json(&self) -> Result<String, SaveError> {
        persistence::to_json(&self.snapshot())
    }

    /// Load a JSON session
    pub fn load_json(&mut self, json: &str) -> Result<(), SaveError> {
        let snapshot = persistence::from_json(json)?;
        self.restore(snapshot);
        Ok(())
    }

    // ── Observations ────────────────────────────────────────────────────

    fn observe(&mut self, kind: ObservationKind, text: impl Into<String>) {
        self.observations.push(self.now_ms, kind, text);
    }

    /// Log a refused operation and hand the error back.
    fn reject(&mut self, error: LabError) -> LabError {
        let kind = match error {
            LabError::ReactionInProgress { .. }
            | LabError::MissingRequirement { .. }
            | LabError::MissingHeat
            | LabError::TemperatureOutOfRange { .. } => ObservationKind::Danger,
            _ => ObservationKind::Warning,
        };
        log::debug!("Refused: {}", error);
        self.observe(kind, error.to_string());
        error
    }

    /// Tell the student what the current mixture in `id` will do.
    fn report_match(&mut self, id: BenchId) {
        let message = match self.matched_rule(id) {
            Some(rule) if rule.is_actionable() => Some((
                ObservationKind::Info,
                format!("Potential reaction detected: {}{}", rule.kind, requirement_hint(rule)),
            )),
            Some(rule) if !rule.observations.is_empty() => {
                Some((ObservationKind::Info, rule.observations.join("; ")))
            }
            Some(_) => Some((ObservationKind::Info, "No visible reaction expected".to_string())),
            None if self.contents(id).len() >= 2 => Some((
                ObservationKind::Info,
                chemlab_logic::constants::NO_RULE_OBSERVATION.to_string(),
            )),
            None => None,
        };
        if let Some((kind, text)) = message {
            self.observe(kind, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemlab_logic::catalog::ChemicalCatalog;
    use chemlab_logic::reactions::{RawReaction, RuleTable};

    fn unit(formula: &str, amount: f64) -> ChemicalUnit {
        ChemicalUnit::new(formula, formula, "#eee", ChemicalType::Reagent, amount)
    }

    fn engine_with(rules: &[(&str, RawReaction)]) -> LabEngine {
        let table = RuleTable::normalize(rules.iter().map(|(k, r)| (*k, r)), &[]);
        LabEngine::new(LabCatalog::with_rules(ChemicalCatalog::default(), table))
    }

    fn neutralization() -> RawReaction {
        RawReaction {
            product: Some("NaCl".into()),
            color: Some("#ffffff".into()),
            kind: Some("neutralization".into()),
            heat: Some("exothermic".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_detects_pending() {
        let mut lab = engine_with(&[("HCl+NaOH", neutralization())]);
        lab.add_chemical(BenchId::FLASK, unit("NaOH", 10.0)).unwrap();
        assert!(lab.container(BenchId::FLASK).unwrap().pending_reaction.is_none());
        lab.add_chemical(BenchId::FLASK, unit("HCl", 10.0)).unwrap();
        let pending = lab.container(BenchId::FLASK).unwrap().pending_reaction.unwrap();
        assert_eq!(pending.key, "HCL+NAOH");
        assert!(lab
            .observations()
            .latest()
            .unwrap()
            .text
            .starts_with("Potential reaction detected: neutralization"));
    }

    #[test]
    fn test_paused_blocks_add() {
        let mut lab = engine_with(&[]);
        lab.set_paused(true);
        assert_eq!(
            lab.add_chemical(BenchId::FLASK, unit("HCl", 10.0)),
            Err(LabError::SimulationPaused)
        );
        assert!(lab.contents(BenchId::FLASK).is_empty());
        assert!(!lab.can_undo());
    }

    #[test]
    fn test_stirrer_requirement() {
        let mut rule = neutralization();
        rule.requires = Some(vec!["stirrer".into()]);
        let mut lab = engine_with(&[("A+B", rule)]);
        lab.add_chemical(BenchId::FLASK, unit("A", 10.0)).unwrap();
        lab.add_chemical(BenchId::FLASK, unit("B", 10.0)).unwrap();
        assert_eq!(
            lab.start_reaction(BenchId::FLASK),
            Err(LabError::MissingRequirement {
                requirement: "stirrer".into()
            })
        );
        lab.place_apparatus("stirrer", 0.0, 0.0);
        assert!(lab.start_reaction(BenchId::FLASK).is_ok());
    }

    #[test]
    fn test_heat_and_temperature_guards() {
        let mut rule = neutralization();
        rule.heat = Some("endothermic".into());
        rule.min_temp = Some(120.0);
        let mut lab = engine_with(&[("A+B", rule)]);
        lab.add_chemical(BenchId::FLASK, unit("A", 10.0)).unwrap();
        lab.add_chemical(BenchId::FLASK, unit("B", 10.0)).unwrap();

        assert_eq!(lab.start_reaction(BenchId::FLASK), Err(LabError::MissingHeat));
        lab.toggle_burner().unwrap();
        assert!(matches!(
            lab.start_reaction(BenchId::FLASK),
            Err(LabError::TemperatureOutOfRange { .. })
        ));
        lab.set_temperature(150.0).unwrap();
        assert!(lab.start_reaction(BenchId::FLASK).is_ok());
    }

    #[test]
    fn test_burner_off_resets_temperature() {
        let mut lab = engine_with(&[]);
        lab.set_burner(true).unwrap();
        lab.set_temperature(400.0).unwrap();
        lab.set_burner(false).unwrap();
        assert_eq!(lab.settings().temperature, 100.0);
    }

    #[test]
    fn test_non_actionable_mixture_completes_unchanged() {
        let mut lab = engine_with(&[]);
        lab.add_chemical(BenchId::FLASK, unit("X", 10.0)).unwrap();
        lab.add_chemical(BenchId::FLASK, unit("Y", 10.0)).unwrap();
        let duration = lab.start_reaction(BenchId::FLASK).unwrap();
        assert_eq!(duration, 3000);
        let events = lab.advance(duration);
        assert_eq!(
            events,
            vec![LabEvent::ReactionCompleted {
                target: BenchId::FLASK,
                product: None
            }]
        );
        assert_eq!(lab.contents(BenchId::FLASK).len(), 2);
        assert_eq!(
            lab.observations().latest().unwrap().text,
            "No significant reaction observed"
        );
    }

    #[test]
    fn test_remove_cancels_reaction() {
        let mut lab = engine_with(&[]);
        let beaker = lab.place_apparatus("beaker", 0.0, 0.0);
        lab.add_chemical(beaker, unit("X", 10.0)).unwrap();
        lab.add_chemical(beaker, unit("Y", 10.0)).unwrap();
        lab.start_reaction(beaker).unwrap();
        lab.remove_apparatus(beaker).unwrap();
        assert!(lab.active_reaction().is_none());
        assert!(lab.advance(10_000).is_empty());
    }

    #[test]
    fn test_flask_is_permanent() {
        let mut lab = engine_with(&[]);
        assert_eq!(
            lab.remove_apparatus(BenchId::FLASK),
            Err(LabError::PermanentFixture)
        );
    }

    #[test]
    fn test_remove_recomputes_flags() {
        let mut lab = engine_with(&[]);
        let stirrer = lab.place_apparatus("stirrer", 0.0, 0.0);
        lab.place_apparatus("retort_stand", 20.0, 0.0);
        assert!(lab.settings().stirrer && lab.settings().stand);
        lab.remove_apparatus(stirrer).unwrap();
        assert!(!lab.settings().stirrer);
        assert!(lab.settings().stand);
    }

    #[test]
    fn test_use_burner_autoplaces_and_toggles() {
        let mut lab = engine_with(&[]);
        lab.use_equipment("burner").unwrap();
        assert!(lab.settings().burner_on);
        assert_eq!(lab.bench().count_kind("burner"), 1);
        lab.use_equipment("burner").unwrap();
        assert!(!lab.settings().burner_on);
        assert_eq!(lab.bench().count_kind("burner"), 1);
    }

    #[test]
    fn test_tool_use_keeps_redo() {
        let mut lab = engine_with(&[]);
        lab.set_temperature(150.0).unwrap();
        let heated = lab.snapshot();
        assert!(lab.undo());

        for tool in ["thermometer", "pipette", "beaker", "spatula"] {
            lab.use_equipment(tool).unwrap();
        }
        assert!(lab.can_redo());
        assert!(lab.redo());
        assert_eq!(lab.snapshot(), heated);

        lab.use_equipment("stirrer").unwrap();
        assert!(lab.settings().stirrer);
        assert!(lab.undo());
        assert!(!lab.settings().stirrer);
    }

    #[test]
    fn test_configured_speed_floor_drives_timers() {
        let config = LabConfig {
            min_sim_speed: 0.25,
            ..Default::default()
        };
        let mut lab = LabEngine::with_config(LabCatalog::default(), config);
        lab.set_sim_speed(0.1).unwrap();
        assert_eq!(lab.settings().sim_speed, 0.25);

        lab.start_countdown(1.0).unwrap();
        assert_eq!(lab.countdown().unwrap().tick_ms, 4000);
        lab.add_chemical(BenchId::FLASK, unit("X", 10.0)).unwrap();
        lab.add_chemical(BenchId::FLASK, unit("Y", 10.0)).unwrap();
        assert_eq!(lab.start_reaction(BenchId::FLASK), Ok(12_000));
    }

    #[test]
    fn test_countdown_at_end_of_clock() {
        let mut lab = engine_with(&[]);
        lab.advance(u64::MAX);
        assert_eq!(lab.start_countdown(1.0), Ok(60));
        let events = lab.advance(1000);
        assert_eq!(events.last(), Some(&LabEvent::CountdownFinished));
        assert!(lab.countdown().is_none());
        assert_eq!(lab.now_ms(), u64::MAX);
    }

    #[test]
    fn test_speed_clamped_and_scales_duration() {
        let mut lab = engine_with(&[]);
        lab.set_sim_speed(0.1).unwrap();
        assert_eq!(lab.settings().sim_speed, 0.5);
        lab.set_sim_speed(4.0).unwrap();
        lab.add_chemical(BenchId::FLASK, unit("X", 10.0)).unwrap();
        lab.add_chemical(BenchId::FLASK, unit("Y", 10.0)).unwrap();
        assert_eq!(lab.start_reaction(BenchId::FLASK), Ok(800));
        assert_eq!(
            lab.set_sim_speed(f64::NAN),
            Err(LabError::InvalidSetting { name: "sim_speed" })
        );
    }

    #[test]
    fn test_chemical_amount_fallback() {
        let mut lab = engine_with(&[]);
        lab.set_chemical_amount(-5.0).unwrap();
        assert_eq!(lab.settings().chemical_amount, 10.0);
        lab.set_chemical_amount(25.0).unwrap();
        assert_eq!(lab.settings().chemical_amount, 25.0);
    }

    #[test]
    fn test_select_and_target() {
        let mut lab = engine_with(&[]);
        let tube = lab.place_apparatus("test_tube", 0.0, 0.0);
        lab.select_container(Some(tube)).unwrap();
        assert_eq!(lab.reaction_target(), tube);
        assert_eq!(
            lab.select_container(Some(BenchId(99))),
            Err(LabError::UnknownContainer { id: BenchId(99) })
        );
        assert_eq!(lab.reaction_target(), tube);
        lab.select_container(Some(BenchId::FLASK)).unwrap();
        assert_eq!(lab.settings().selected, None);
    }

    #[test]
    fn test_countdown_starts_flask_reaction() {
        let mut lab = engine_with(&[("HCl+NaOH", neutralization())]);
        lab.add_chemical(BenchId::FLASK, unit("HCl", 10.0)).unwrap();
        lab.add_chemical(BenchId::FLASK, unit("NaOH", 10.0)).unwrap();
        assert_eq!(lab.start_countdown(0.05).unwrap(), 3);

        let events = lab.advance(3000);
        assert_eq!(
            events,
            vec![
                LabEvent::CountdownTick { remaining_secs: 2 },
                LabEvent::CountdownTick { remaining_secs: 1 },
                LabEvent::CountdownFinished,
                LabEvent::ReactionStarted {
                    target: BenchId::FLASK,
                    duration_ms: 3000
                },
            ]
        );
        assert!(lab.countdown().is_none());
        assert_eq!(lab.active_reaction().unwrap().end_at, Some(6000));
    }

    #[test]
    fn test_pause_freezes_countdown() {
        let mut lab = engine_with(&[]);
        lab.start_countdown(1.0).unwrap();
        lab.advance(1500);
        lab.set_paused(true);
        assert!(lab.advance(60_000).is_empty());
        lab.set_paused(false);
        let events = lab.advance(500);
        assert_eq!(events, vec![LabEvent::CountdownTick { remaining_secs: 58 }]);
        assert_eq!(lab.countdown_display().as_deref(), Some("0:58"));
    }

    #[test]
    fn test_hazard_follows_target() {
        let mut lab = engine_with(&[]);
        assert_eq!(lab.hazard().label, "None");
        let acid = ChemicalUnit::new("HCl", "HCl", "#fff", ChemicalType::Acid, 10.0);
        lab.add_chemical(BenchId::FLASK, acid).unwrap();
        assert_eq!(lab.hazard().label, "Acid");
    }

    #[test]
    fn test_undo_restores_paused_reaction() {
        let mut lab = engine_with(&[]);
        lab.add_chemical(BenchId::FLASK, unit("X", 10.0)).unwrap();
        lab.add_chemical(BenchId::FLASK, unit("Y", 10.0)).unwrap();
        lab.start_reaction(BenchId::FLASK).unwrap();
        lab.advance(1000);
        lab.set_paused(true);
        let before = lab.snapshot();
        lab.place_apparatus("beaker", 0.0, 0.0);
        assert!(lab.undo());
        assert_eq!(lab.snapshot(), before);
        assert_eq!(lab.active_reaction().unwrap().end_at, None);

        lab.set_paused(false);
        let events = lab.advance(2000);
        assert_eq!(events.len(), 1);
    }
}
