//! Multirotor simulator node
//!
//! Wraps the rigid-body plant into the graph: consumes one throttle stream
//! per motor and emits nine sensor streams at independently configurable
//! rates, each paced by its own dt accumulator so sensor rates are decoupled
//! from the scheduler tick, and each carrying configurable additive uniform
//! noise.
//!
//! This node is the graph's designated plant: the validator breaks the
//! control loop here, so its sensor outputs are observed with a one-tick
//! delay by everything downstream.

mod simulation;

pub use simulation::{coords, MultirotorSimulation, UavState};

use std::rc::Rc;

use nalgebra::Vector3;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use talon_core::defs::{TreeValue, TypeRegistry, Value};
use talon_core::error::{TalonError, TalonResult};
use talon_core::graph::{
    MultirotorSimulatorConfig, MultirotorSimulatorDescriptor, Node, NodeClass, NodeConfig,
    NodeDescriptor, NodeStats, OutputSpec, PortSpec, TickCtx,
};
use talon_core::stream::{
    Acceleration, AngularVelocity, Distance, EcefPosition, EcefVelocity, GpsFix, GpsInfo,
    MagneticField, Pressure, Stream, StreamHandle, StreamReader, StreamType, StreamValue,
    Temperature, Throttle,
};

/// Registry name of the simulator's state record, served by `get_state`
pub const UAV_STATE_TYPE: &str = "uav_state";

struct PacedOutput<T: StreamValue> {
    stream: Rc<Stream<T>>,
    period_us: u64,
    accumulated_us: u64,
    ts_us: u64,
}

impl<T: StreamValue> PacedOutput<T> {
    fn new(node: &str, name: &str, rate_hz: u32) -> TalonResult<Self> {
        if rate_hz == 0 {
            return Err(TalonError::config(format!("bad {} rate: 0Hz", name)));
        }
        Ok(Self {
            stream: Stream::new(format!("{}/{}", node, name), rate_hz)?,
            period_us: 1_000_000 / u64::from(rate_hz),
            accumulated_us: 0,
            ts_us: 0,
        })
    }

    fn start(&mut self, origin_us: u64) {
        self.accumulated_us = 0;
        self.ts_us = origin_us;
    }

    /// Accumulate simulated time and emit one sample per elapsed period
    fn pace(&mut self, sub_dt_us: u64, mut make: impl FnMut() -> (T, bool)) {
        self.accumulated_us += sub_dt_us;
        while self.accumulated_us >= self.period_us {
            self.accumulated_us -= self.period_us;
            self.ts_us += self.period_us;
            let (value, is_healthy) = make();
            self.stream.push_with_health(value, self.ts_us, is_healthy);
        }
    }
}

struct SensorOutputs {
    angular_velocity: PacedOutput<AngularVelocity>,
    acceleration: PacedOutput<Acceleration>,
    magnetic_field: PacedOutput<MagneticField>,
    pressure: PacedOutput<Pressure>,
    temperature: PacedOutput<Temperature>,
    sonar_distance: PacedOutput<Distance>,
    gps_info: PacedOutput<GpsInfo>,
    ecef_position: PacedOutput<EcefPosition>,
    ecef_velocity: PacedOutput<EcefVelocity>,
}

impl SensorOutputs {
    fn new(node: &str, desc: &MultirotorSimulatorDescriptor) -> TalonResult<Self> {
        Ok(Self {
            angular_velocity: PacedOutput::new(
                node,
                "angular_velocity",
                desc.angular_velocity_rate_hz,
            )?,
            acceleration: PacedOutput::new(node, "acceleration", desc.acceleration_rate_hz)?,
            magnetic_field: PacedOutput::new(node, "magnetic_field", desc.magnetic_field_rate_hz)?,
            pressure: PacedOutput::new(node, "pressure", desc.pressure_rate_hz)?,
            temperature: PacedOutput::new(node, "temperature", desc.temperature_rate_hz)?,
            sonar_distance: PacedOutput::new(node, "sonar_distance", desc.distance_rate_hz)?,
            gps_info: PacedOutput::new(node, "gps_info", desc.gps_rate_hz)?,
            ecef_position: PacedOutput::new(node, "ecef_position", desc.gps_rate_hz)?,
            ecef_velocity: PacedOutput::new(node, "ecef_velocity", desc.gps_rate_hz)?,
        })
    }

    fn start(&mut self, origin_us: u64) {
        self.angular_velocity.start(origin_us);
        self.acceleration.start(origin_us);
        self.magnetic_field.start(origin_us);
        self.pressure.start(origin_us);
        self.temperature.start(origin_us);
        self.sonar_distance.start(origin_us);
        self.gps_info.start(origin_us);
        self.ecef_position.start(origin_us);
        self.ecef_velocity.start(origin_us);
    }

    fn clear(&self) {
        self.angular_velocity.stream.clear();
        self.acceleration.stream.clear();
        self.magnetic_field.stream.clear();
        self.pressure.stream.clear();
        self.temperature.stream.clear();
        self.sonar_distance.stream.clear();
        self.gps_info.stream.clear();
        self.ecef_position.stream.clear();
        self.ecef_velocity.stream.clear();
    }

    fn specs(&self) -> Vec<OutputSpec> {
        vec![
            OutputSpec {
                name: "angular_velocity".into(),
                stream: self.angular_velocity.stream.clone(),
            },
            OutputSpec {
                name: "acceleration".into(),
                stream: self.acceleration.stream.clone(),
            },
            OutputSpec {
                name: "magnetic_field".into(),
                stream: self.magnetic_field.stream.clone(),
            },
            OutputSpec {
                name: "pressure".into(),
                stream: self.pressure.stream.clone(),
            },
            OutputSpec {
                name: "temperature".into(),
                stream: self.temperature.stream.clone(),
            },
            OutputSpec {
                name: "sonar_distance".into(),
                stream: self.sonar_distance.stream.clone(),
            },
            OutputSpec {
                name: "gps_info".into(),
                stream: self.gps_info.stream.clone(),
            },
            OutputSpec {
                name: "ecef_position".into(),
                stream: self.ecef_position.stream.clone(),
            },
            OutputSpec {
                name: "ecef_velocity".into(),
                stream: self.ecef_velocity.stream.clone(),
            },
        ]
    }
}

/// The reference plant as a graph node
pub struct MultirotorSimulatorNode {
    name: String,
    registry: Rc<TypeRegistry>,
    descriptor: Option<MultirotorSimulatorDescriptor>,
    config: MultirotorSimulatorConfig,
    simulation: Option<MultirotorSimulation>,
    outputs: Option<SensorOutputs>,
    throttles: Vec<StreamReader<Throttle>>,
    rng: ChaCha8Rng,
    last_tp_us: u64,
    stats: NodeStats,
}

impl MultirotorSimulatorNode {
    pub fn new(name: &str, registry: Rc<TypeRegistry>) -> Self {
        let config = MultirotorSimulatorConfig::default();
        Self {
            name: name.to_string(),
            registry,
            descriptor: None,
            rng: ChaCha8Rng::seed_from_u64(config.noise_seed),
            config,
            simulation: None,
            outputs: None,
            throttles: Vec::new(),
            last_tp_us: 0,
            stats: NodeStats::default(),
        }
    }

    /// Direct access to the plant, for scenario setup in tests
    pub fn simulation_mut(&mut self) -> Option<&mut MultirotorSimulation> {
        self.simulation.as_mut()
    }

    fn state_value(&self) -> TalonResult<Value> {
        let ty = self
            .registry
            .find(UAV_STATE_TYPE)
            .ok_or_else(|| TalonError::internal("uav_state type not registered"))?;
        let state = self
            .simulation
            .as_ref()
            .ok_or_else(|| TalonError::internal("simulator not initialized"))?
            .state();
        let q = state.attitude.as_ref().coords;
        Ok(Value::Record {
            ty,
            fields: vec![
                Value::Vec3(state.enu_position.into()),
                Value::Vec3(state.enu_velocity.into()),
                Value::Vec4([q.x, q.y, q.z, q.w]),
                Value::Vec3(state.angular_velocity.into()),
                Value::F64(state.pressure),
                Value::F32(state.temperature),
                Value::F32(state.proximity_distance),
            ],
        })
    }
}

fn uniform(rng: &mut ChaCha8Rng, full_range: f32) -> f32 {
    let half = full_range * 0.5;
    if half <= 0.0 {
        0.0
    } else {
        rng.gen_range(-half..=half)
    }
}

fn uniform3(rng: &mut ChaCha8Rng, full_range: f32) -> Vector3<f32> {
    Vector3::new(
        uniform(rng, full_range),
        uniform(rng, full_range),
        uniform(rng, full_range),
    )
}

impl Node for MultirotorSimulatorNode {
    fn kind(&self) -> &'static str {
        "multirotor_simulator"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> NodeClass {
        NodeClass::Simulator
    }

    fn init(&mut self, descriptor: &NodeDescriptor) -> TalonResult<()> {
        let NodeDescriptor::MultirotorSimulator(desc) = descriptor else {
            return Err(TalonError::kind_mismatch(
                "multirotor_simulator descriptor",
                descriptor.kind(),
            ));
        };
        if desc.throttle_rate_hz == 0 {
            return Err(TalonError::config("bad throttle rate: 0Hz"));
        }
        self.simulation = Some(MultirotorSimulation::new(desc.params.clone())?);
        self.outputs = Some(SensorOutputs::new(&self.name, desc)?);
        self.throttles = (0..desc.params.motors.len())
            .map(|_| StreamReader::unbound())
            .collect();
        self.descriptor = Some(desc.clone());
        Ok(())
    }

    fn descriptor(&self) -> NodeDescriptor {
        let desc = self.descriptor.clone().unwrap_or_else(|| {
            MultirotorSimulatorDescriptor::with_default_rates(
                talon_core::graph::MultirotorParams::quad_x(0.25, 1.0, 0.0),
            )
        });
        NodeDescriptor::MultirotorSimulator(desc)
    }

    fn apply_config(&mut self, config: &NodeConfig) -> TalonResult<()> {
        let NodeConfig::MultirotorSimulator(config) = config else {
            return Err(TalonError::kind_mismatch(
                "multirotor_simulator config",
                config.kind(),
            ));
        };
        self.config = config.clone();
        self.rng = ChaCha8Rng::seed_from_u64(config.noise_seed);
        if let Some(sim) = &mut self.simulation {
            sim.simulation_enabled = config.simulation_enabled;
            sim.gravity_enabled = config.gravity_enabled;
            sim.ground_enabled = config.ground_enabled;
            sim.drag_enabled = config.drag_enabled;
        }
        Ok(())
    }

    fn config(&self) -> NodeConfig {
        NodeConfig::MultirotorSimulator(self.config.clone())
    }

    fn inputs(&self) -> Vec<PortSpec> {
        let rate_hz = self
            .descriptor
            .as_ref()
            .map(|d| d.throttle_rate_hz)
            .unwrap_or_default();
        (0..self.throttles.len())
            .map(|i| PortSpec {
                name: format!("throttle_{}", i),
                stream_type: StreamType::Throttle,
                rate_hz,
            })
            .collect()
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        self.outputs.as_ref().map(SensorOutputs::specs).unwrap_or_default()
    }

    fn bind_input(&mut self, port_idx: usize, stream: Option<&StreamHandle>) -> TalonResult<()> {
        let reader = self
            .throttles
            .get_mut(port_idx)
            .ok_or_else(|| TalonError::invalid_input("no such port"))?;
        *reader = match stream {
            Some(handle) => StreamReader::bind(handle)?,
            None => StreamReader::unbound(),
        };
        Ok(())
    }

    fn send_message(&mut self, message: &TreeValue) -> TalonResult<TreeValue> {
        match message.as_str() {
            Some("reset") => {
                if let Some(sim) = &mut self.simulation {
                    sim.reset();
                }
                Ok(TreeValue::Null)
            }
            Some("stop_motion") => {
                if let Some(sim) = &mut self.simulation {
                    sim.stop_motion();
                }
                Ok(TreeValue::Null)
            }
            Some("get_state") => {
                let value = self.state_value()?;
                Ok(self.registry.serialize(&value))
            }
            _ => Err(TalonError::invalid_input("unknown simulator message")),
        }
    }

    fn start(&mut self, origin_us: u64) {
        self.last_tp_us = origin_us;
        if let Some(outputs) = &mut self.outputs {
            outputs.start(origin_us);
        }
    }

    fn process(&mut self, ctx: &TickCtx) {
        let Some(outputs) = &mut self.outputs else {
            warn!(node = %self.name, "process before init");
            return;
        };
        outputs.clear();

        let Some(mut sim) = self.simulation.take() else {
            return;
        };

        // freshest commanded throttle per motor
        for (i, reader) in self.throttles.iter().enumerate() {
            if let Some(sample) = reader.latest() {
                sim.set_motor_throttle(i, sample.value.0);
            }
        }

        // degenerate steps would blow up the integrator
        let dt_us = ctx.now_us.saturating_sub(self.last_tp_us);
        if dt_us < 1_000 {
            self.simulation = Some(sim);
            return;
        }
        self.last_tp_us = ctx.now_us;

        let noise = self.config.noise.clone();
        let rng = &mut self.rng;
        sim.process(dt_us, |sim, sub_dt| {
            let state = sim.state();
            outputs.angular_velocity.pace(sub_dt, || {
                (
                    AngularVelocity(state.angular_velocity + uniform3(rng, noise.angular_velocity)),
                    true,
                )
            });
            outputs.acceleration.pace(sub_dt, || {
                (
                    Acceleration(state.acceleration + uniform3(rng, noise.acceleration)),
                    true,
                )
            });
            outputs.magnetic_field.pace(sub_dt, || {
                (
                    MagneticField(state.magnetic_field + uniform3(rng, noise.magnetic_field)),
                    true,
                )
            });
            outputs.pressure.pace(sub_dt, || {
                (
                    Pressure(state.pressure + f64::from(uniform(rng, noise.pressure))),
                    true,
                )
            });
            outputs.temperature.pace(sub_dt, || {
                (
                    Temperature(state.temperature + uniform(rng, noise.temperature)),
                    true,
                )
            });
            outputs.sonar_distance.pace(sub_dt, || {
                let distance = state.proximity_distance;
                (
                    Distance(distance + uniform(rng, noise.ground_distance)),
                    distance > f32::EPSILON,
                )
            });
            outputs.gps_info.pace(sub_dt, || {
                (
                    GpsInfo {
                        fix: GpsFix::Fix3D,
                        visible_satellites: 4,
                        fix_satellites: 4,
                        pacc: uniform(rng, noise.gps_pacc).abs(),
                        vacc: uniform(rng, noise.gps_vacc).abs(),
                    },
                    true,
                )
            });
            outputs.ecef_position.pace(sub_dt, || {
                let enu = state.enu_position.map(f64::from);
                let noise_v = uniform3(rng, noise.gps_position).map(f64::from);
                (
                    EcefPosition(coords::enu_to_ecef_position(enu) + noise_v),
                    true,
                )
            });
            outputs.ecef_velocity.pace(sub_dt, || {
                let rotated = coords::enu_to_ecef_rotation() * state.enu_velocity.map(f64::from);
                (
                    EcefVelocity(rotated.map(|c| c as f32) + uniform3(rng, noise.gps_velocity)),
                    true,
                )
            });
        });

        self.simulation = Some(sim);
    }

    fn stats(&self) -> NodeStats {
        self.stats.clone()
    }
}
