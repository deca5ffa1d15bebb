//! # Digitizer
//!
//! Derived collections computed once per event from the rows an input
//! collection gained since its begin-of-event marker:
//!
//! ```text
//!   Hits ──► HitsAdder ──► Singles ──► EnergyWindowRouter ──► one collection per channel
//!                                              │
//!                                       last window id ──► training set (Russian roulette)
//! ```

pub mod adder;
pub mod energy_windows;
pub mod training;

pub use adder::{AdderPolicy, HitsAdder};
pub use energy_windows::{EnergyChannel, EnergyWindowRouter};
pub use training::{training_columns, IncidentParticle, RussianRoulette};
