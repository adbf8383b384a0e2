//! Typed descriptors and configs for the standard node kinds
//!
//! One struct per node kind, dispatched through the tagged [`NodeDescriptor`]
//! / [`NodeConfig`] enums. A descriptor is immutable after init and fully
//! describes a node's shape; a config carries the tunables that may change at
//! runtime.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One motor of a multirotor frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorGeometry {
    /// Body-frame position, m
    pub position: Vector3<f32>,
    /// Rotation direction as seen from above
    pub clockwise: bool,
}

/// Physical description of a multirotor, shared by the mixer and the plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultirotorParams {
    /// Takeoff mass, kg
    pub mass: f32,
    /// Frame radius (used for the inertia estimate), m
    pub radius: f32,
    /// Frame height, m
    pub height: f32,
    /// Maximum thrust of one motor, N
    pub motor_thrust: f32,
    /// Reactive yaw torque of one motor at full thrust, N·m
    pub motor_z_torque: f32,
    /// Motor spin-up rate, throttle/s
    pub motor_acceleration: f32,
    /// Motor spin-down rate, throttle/s
    pub motor_deceleration: f32,
    pub motors: Vec<MotorGeometry>,
}

impl MultirotorParams {
    /// A symmetric quad-X frame with alternating rotation
    pub fn quad_x(arm: f32, motor_thrust: f32, motor_z_torque: f32) -> Self {
        let motors = vec![
            MotorGeometry {
                position: Vector3::new(arm, arm, 0.0),
                clockwise: true,
            },
            MotorGeometry {
                position: Vector3::new(-arm, arm, 0.0),
                clockwise: false,
            },
            MotorGeometry {
                position: Vector3::new(-arm, -arm, 0.0),
                clockwise: true,
            },
            MotorGeometry {
                position: Vector3::new(arm, -arm, 0.0),
                clockwise: false,
            },
        ];
        Self {
            mass: 1.2,
            radius: arm * std::f32::consts::SQRT_2,
            height: 0.1,
            motor_thrust,
            motor_z_torque,
            motor_acceleration: 8.0,
            motor_deceleration: 6.0,
            motors,
        }
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorDescriptor {
    pub rate_hz: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarGeneratorConfig {
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorGeneratorConfig {
    pub value: Vector3<f32>,
}

impl Default for VectorGeneratorConfig {
    fn default() -> Self {
        Self {
            value: Vector3::zeros(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ammeter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmeterDescriptor {
    pub rate_hz: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmeterConfig {
    /// ADC full-scale to amperes
    pub scale: f32,
    pub bias: f32,
}

impl Default for AmmeterConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            bias: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Motor mixer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorMixerDescriptor {
    pub rate_hz: u32,
    pub params: MultirotorParams,
}

/// Mixer tunables; `params: None` keeps the descriptor geometry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorMixerConfig {
    pub params: Option<MultirotorParams>,
}

// ---------------------------------------------------------------------------
// Multirotor simulator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultirotorSimulatorDescriptor {
    pub params: MultirotorParams,
    pub throttle_rate_hz: u32,
    pub angular_velocity_rate_hz: u32,
    pub acceleration_rate_hz: u32,
    pub magnetic_field_rate_hz: u32,
    pub pressure_rate_hz: u32,
    pub temperature_rate_hz: u32,
    pub distance_rate_hz: u32,
    pub gps_rate_hz: u32,
}

impl MultirotorSimulatorDescriptor {
    /// Typical bench rates for a given frame
    pub fn with_default_rates(params: MultirotorParams) -> Self {
        Self {
            params,
            throttle_rate_hz: 100,
            angular_velocity_rate_hz: 500,
            acceleration_rate_hz: 500,
            magnetic_field_rate_hz: 100,
            pressure_rate_hz: 50,
            temperature_rate_hz: 10,
            distance_rate_hz: 15,
            gps_rate_hz: 5,
        }
    }
}

/// Additive uniform noise half-ranges per sensor output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatorNoise {
    pub gps_position: f32,
    pub gps_velocity: f32,
    pub gps_pacc: f32,
    pub gps_vacc: f32,
    pub acceleration: f32,
    pub angular_velocity: f32,
    pub magnetic_field: f32,
    pub pressure: f32,
    pub temperature: f32,
    pub ground_distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultirotorSimulatorConfig {
    pub simulation_enabled: bool,
    pub gravity_enabled: bool,
    pub ground_enabled: bool,
    pub drag_enabled: bool,
    pub noise: SimulatorNoise,
    /// Seed for the noise generator, so runs are reproducible
    pub noise_seed: u64,
}

impl Default for MultirotorSimulatorConfig {
    fn default() -> Self {
        Self {
            simulation_enabled: true,
            gravity_enabled: true,
            ground_enabled: true,
            drag_enabled: true,
            noise: SimulatorNoise::default(),
            noise_seed: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Barometer
// ---------------------------------------------------------------------------

/// Pressure is produced at `rate_hz`, temperature at half that, matching the
/// sensor's alternating conversion cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarometerDescriptor {
    pub rate_hz: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarometerConfig {
    /// Static pressure offset applied after compensation, Pa
    pub pressure_bias: f64,
}

// ---------------------------------------------------------------------------
// Motor output sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorOutputDescriptor {
    pub channels: u32,
    pub rate_hz: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorOutputConfig {
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
}

impl Default for MotorOutputConfig {
    fn default() -> Self {
        Self {
            min_pulse_us: 1000,
            max_pulse_us: 2000,
        }
    }
}

// ---------------------------------------------------------------------------
// Tagged dispatch
// ---------------------------------------------------------------------------

/// Construction parameters of a node, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum NodeDescriptor {
    ScalarGenerator(GeneratorDescriptor),
    ForceGenerator(GeneratorDescriptor),
    TorqueGenerator(GeneratorDescriptor),
    Ammeter(AmmeterDescriptor),
    MotorMixer(MotorMixerDescriptor),
    MultirotorSimulator(MultirotorSimulatorDescriptor),
    Barometer(BarometerDescriptor),
    MotorOutput(MotorOutputDescriptor),
}

impl NodeDescriptor {
    /// Catalog kind name this descriptor instantiates
    pub fn kind(&self) -> &'static str {
        match self {
            NodeDescriptor::ScalarGenerator(_) => "scalar_generator",
            NodeDescriptor::ForceGenerator(_) => "force_generator",
            NodeDescriptor::TorqueGenerator(_) => "torque_generator",
            NodeDescriptor::Ammeter(_) => "ammeter",
            NodeDescriptor::MotorMixer(_) => "motor_mixer",
            NodeDescriptor::MultirotorSimulator(_) => "multirotor_simulator",
            NodeDescriptor::Barometer(_) => "barometer",
            NodeDescriptor::MotorOutput(_) => "motor_output",
        }
    }
}

/// Runtime tunables of a node, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum NodeConfig {
    ScalarGenerator(ScalarGeneratorConfig),
    ForceGenerator(VectorGeneratorConfig),
    TorqueGenerator(VectorGeneratorConfig),
    Ammeter(AmmeterConfig),
    MotorMixer(MotorMixerConfig),
    MultirotorSimulator(MultirotorSimulatorConfig),
    Barometer(BarometerConfig),
    MotorOutput(MotorOutputConfig),
}

impl NodeConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeConfig::ScalarGenerator(_) => "scalar_generator",
            NodeConfig::ForceGenerator(_) => "force_generator",
            NodeConfig::TorqueGenerator(_) => "torque_generator",
            NodeConfig::Ammeter(_) => "ammeter",
            NodeConfig::MotorMixer(_) => "motor_mixer",
            NodeConfig::MultirotorSimulator(_) => "multirotor_simulator",
            NodeConfig::Barometer(_) => "barometer",
            NodeConfig::MotorOutput(_) => "motor_output",
        }
    }
}
