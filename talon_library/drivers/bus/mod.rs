//! Bus drivers
//!
//! # Available Drivers
//!
//! - [`SimulationBus`] - Always available, simulates a register-addressed bus

mod simulation;

pub use simulation::SimulationBus;
