//! Pure lab logic for ChemLab.
//!
//! This crate contains the rules of the virtual lab bench that are
//! independent of any engine, clock, or storage. Functions take plain data
//! and return results, making them unit-testable and reusable from the
//! simulation engine, the headless harness, and any future front-end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Chemical and equipment catalog records, reactant identifiers |
//! | [`config`] | Tunable limits and defaults for a lab session |
//! | [`constants`] | Capacity, history, timing and vessel constants |
//! | [`hazard`] | Hazard badge classification for container contents |
//! | [`observations`] | Observation kinds and panel relevance filter |
//! | [`reactions`] | Order-insensitive reaction rule table, rule auditing, equations |
//! | [`timing`] | Reaction/countdown timer arithmetic under simulation speed |

pub mod catalog;
pub mod config;
pub mod constants;
pub mod hazard;
pub mod observations;
pub mod reactions;
pub mod timing;
