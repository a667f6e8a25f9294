//! Systems - stateful services the lab engine drives

mod countdown;
mod history;
mod observations;
mod scheduler;

pub use countdown::*;
pub use history::*;
pub use observations::*;
pub use scheduler::*;
