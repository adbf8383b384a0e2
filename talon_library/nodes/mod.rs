//! Standard node kinds
//!
//! Every node here implements [`talon_core::graph::Node`] and registers with
//! the standard catalog under its kind name:
//!
//! | kind | class | role |
//! |---|---|---|
//! | `scalar_generator` | generator | constant scalar, optional modulation |
//! | `force_generator` | generator | constant collective-force target |
//! | `torque_generator` | generator | constant body-torque target |
//! | `ammeter` | processor | ADC to current scaling |
//! | `motor_mixer` | processor | torque/force to per-motor throttle |
//! | `multirotor_simulator` | simulator | the virtual plant |
//! | `barometer` | source | bus-attached pressure/temperature sensor |
//! | `motor_output` | sink | throttle to ESC pulse widths |

pub mod ammeter;
pub mod barometer;
pub mod generator;
pub mod motor_mixer;
pub mod motor_output;
pub mod multirotor_simulator;

pub use ammeter::AmmeterNode;
pub use barometer::BarometerNode;
pub use generator::{ForceGeneratorNode, ScalarGeneratorNode, TorqueGeneratorNode};
pub use motor_mixer::{validate_geometry, MotorMixerNode};
pub use motor_output::MotorOutputNode;
pub use multirotor_simulator::{MultirotorSimulation, MultirotorSimulatorNode, UavState};
