//! ChemLab Core - Virtual Chemistry Bench Engine
//!
//! A deterministic simulation of a school chemistry bench: a permanent
//! flask, vessels and apparatus placed around it, timed reactions gated by
//! stirring and heat, and snapshot-based undo/redo.
//!
//! # Architecture
//!
//! Bench items live in a `hecs` world:
//! - **Entities**: the flask, placed vessels, placed apparatus
//! - **Components**: pure data attached to them (Container, Apparatus, BenchPosition)
//! - **Systems**: the reaction scheduler, countdown, observation log and history
//!
//! [`engine::LabEngine`] ties them together. Time is an explicit
//! millisecond clock moved by `advance`, so every timed behaviour is
//! reproducible.
//!
//! # Example
//!
//! ```rust,no_run
//! use chemlab_core::prelude::*;
//!
//! let catalog = LabCatalog::from_json(
//!     include_str!("../../../data/chemicals.json"),
//!     include_str!("../../../data/equipment.json"),
//!     include_str!("../../../data/reactions.json"),
//! )
//! .expect("bundled catalog");
//! let mut lab = LabEngine::new(catalog);
//!
//! let hcl = lab.catalog().chemicals.find("HCl").cloned().unwrap();
//! let naoh = lab.catalog().chemicals.find("NaOH").cloned().unwrap();
//! lab.add_catalog_chemical(BenchId::FLASK, &hcl).unwrap();
//! lab.add_catalog_chemical(BenchId::FLASK, &naoh).unwrap();
//! let duration = lab.start_reaction(BenchId::FLASK).unwrap();
//!
//! for event in lab.advance(duration) {
//!     println!("{:?}", event);
//! }
//! ```

pub mod bench;
pub mod catalog;
pub mod components;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::bench::Bench;
    pub use crate::catalog::LabCatalog;
    pub use crate::components::*;
    pub use crate::engine::{LabEngine, LabEvent, LabSettings};
    pub use crate::error::LabError;
    pub use crate::persistence::LabSnapshot;
}
