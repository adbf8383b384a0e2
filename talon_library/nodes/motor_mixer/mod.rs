//! Motor mixer
//!
//! Turns a commanded collective force and body torque into per-motor throttle
//! values by iteratively projecting the torque error onto each motor's
//! normalized torque-contribution vector, then mapping thrust to throttle
//! through the square-law propeller model `throttle = sqrt(thrust /
//! max_thrust)`.
//!
//! Geometry is validated at init: motor positions must sum to ~zero
//! (mass-centered frame) and the full-thrust torque contributions must cancel
//! (a frame that cannot hover level is refused). If the configured motor
//! count ever differs from the init-time count, the tick is skipped rather
//! than emitting throttles for a frame the outputs don't match.

use std::rc::Rc;

use nalgebra::Vector3;
use tracing::{debug, warn};

use talon_core::error::{TalonError, TalonResult};
use talon_core::graph::{
    MotorMixerConfig, MotorMixerDescriptor, MultirotorParams, Node, NodeClass, NodeConfig,
    NodeDescriptor, NodeStats, OutputSpec, PortSpec, TickCtx,
};
use talon_core::stream::{
    Accumulator2, Force, Stream, StreamHandle, StreamReader, StreamType, Throttle, Torque,
};

/// Floor thrust per motor keeping rotors spinning, N
const MIN_THRUST: f32 = 0.01;
/// Fraction of the torque error applied per iteration
const STEP: f32 = 0.9;
/// Per-component torque convergence threshold, N·m
const CONVERGENCE: f32 = 0.01;
const ITERATION_WARN: usize = 5_000;
const ITERATION_LIMIT: usize = 50_000;
/// Geometry symmetry tolerance (m for the center, N·m for the torque sum)
const SYMMETRY_TOLERANCE: f32 = 0.05;

fn thrust_axis() -> Vector3<f32> {
    Vector3::z()
}

/// Check a frame for mass-centered, torque-balanced motor placement
pub fn validate_geometry(params: &MultirotorParams) -> TalonResult<()> {
    if params.motors.is_empty() {
        return Err(TalonError::AsymmetricGeometry("no motors".into()));
    }
    let axis = thrust_axis();
    let mut center = Vector3::zeros();
    let mut torque = Vector3::zeros();
    for motor in &params.motors {
        center += motor.position;
        let sign = if motor.clockwise { 1.0 } else { -1.0 };
        torque += motor.position.cross(&axis) + axis * (params.motor_z_torque * sign);
    }
    if center.norm() > SYMMETRY_TOLERANCE {
        return Err(TalonError::AsymmetricGeometry(format!(
            "motors are not centered (|sum| = {:.3}m)",
            center.norm()
        )));
    }
    if torque.norm() > SYMMETRY_TOLERANCE {
        return Err(TalonError::AsymmetricGeometry(format!(
            "motors don't produce symmetrical thrust (|sum| = {:.3})",
            torque.norm()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
struct MotorState {
    max_torque: Vector3<f32>,
    torque_dir: Vector3<f32>,
    thrust: f32,
}

/// The mixer node: torque + collective force in, one throttle stream per
/// motor out
pub struct MotorMixerNode {
    name: String,
    rate_hz: u32,
    params: MultirotorParams,
    config: MotorMixerConfig,
    outputs: Vec<Rc<Stream<Throttle>>>,
    torque: StreamReader<Torque>,
    force: StreamReader<Force>,
    accumulator: Accumulator2<Torque, Force>,
    motors: Vec<MotorState>,
    stats: NodeStats,
}

impl MotorMixerNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rate_hz: 0,
            params: MultirotorParams::quad_x(0.25, 1.0, 0.0),
            config: MotorMixerConfig::default(),
            outputs: Vec::new(),
            torque: StreamReader::unbound(),
            force: StreamReader::unbound(),
            accumulator: Accumulator2::new(),
            motors: Vec::new(),
            stats: NodeStats::default(),
        }
    }

    /// Geometry currently in effect (config override or descriptor)
    fn active_params(&self) -> &MultirotorParams {
        self.config.params.as_ref().unwrap_or(&self.params)
    }

    /// One mixing step; returns per-motor throttles in [0, 1]
    fn compute_throttles(&mut self, target: Vector3<f32>, collective_force: Vector3<f32>) -> Vec<f32> {
        let params = self.active_params().clone();
        let axis = thrust_axis();
        let motor_thrust = params.motor_thrust;
        let n = self.motors.len() as f32;

        for (state, motor) in self.motors.iter_mut().zip(&params.motors) {
            let sign = if motor.clockwise { 1.0 } else { -1.0 };
            state.max_torque = motor.position.cross(&(axis * motor_thrust))
                + axis * (params.motor_z_torque * sign);
            state.torque_dir = state
                .max_torque
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vector3::zeros);
            state.thrust = MIN_THRUST;
        }

        // collective thrust, shared equally, with a widened dynamic range
        // around it for torque authority
        let mut thrust_min = MIN_THRUST;
        let mut thrust_max = MIN_THRUST;
        let target_thrust = collective_force.dot(&axis);
        if target_thrust >= 0.0 {
            let th = (target_thrust / n).clamp(MIN_THRUST, motor_thrust);
            for state in &mut self.motors {
                state.thrust = th;
            }
            let dyn_range = (th - MIN_THRUST).min(motor_thrust - th) * 1.5;
            thrust_min = (th - dyn_range).max(MIN_THRUST);
            thrust_max = (th + dyn_range).min(motor_thrust);
        }

        // walk the actual torque toward the target
        let mut iteration = 0usize;
        let mut previous = Vector3::zeros();
        loop {
            let mut actual = Vector3::zeros();
            for state in &self.motors {
                actual += state.max_torque * (state.thrust / motor_thrust);
            }

            if iteration > 0 && (actual - previous).amax() <= f32::EPSILON {
                debug!(node = %self.name, iteration, "torque stabilized");
                break;
            }
            previous = actual;

            if (actual - target).amax() < CONVERGENCE {
                debug!(node = %self.name, iteration, "torque converged");
                break;
            }

            // distribute the error across all motors, each weighted by how
            // much it can influence the target direction
            let diff = (target - actual) / n;
            for state in &mut self.motors {
                let f = state.torque_dir.dot(&diff) * STEP;
                state.thrust = (state.thrust + f).clamp(thrust_min, thrust_max);
            }

            iteration += 1;
            if iteration == ITERATION_WARN {
                warn!(node = %self.name, iteration, "mixer is converging slowly");
            }
            if iteration > ITERATION_LIMIT {
                warn!(node = %self.name, ?target, "mixer did not converge");
                self.stats
                    .record(&TalonError::internal("mixer did not converge"));
                break;
            }
        }

        self.motors
            .iter()
            .map(|state| {
                let thrust = state.thrust.clamp(thrust_min, thrust_max);
                throttle_from_thrust(motor_thrust, thrust).clamp(0.0, 1.0)
            })
            .collect()
    }
}

/// Square-law propeller model
fn throttle_from_thrust(max_thrust: f32, thrust: f32) -> f32 {
    if max_thrust <= f32::EPSILON {
        return 0.0;
    }
    (thrust / max_thrust).max(0.0).sqrt()
}

impl Node for MotorMixerNode {
    fn kind(&self) -> &'static str {
        "motor_mixer"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> NodeClass {
        NodeClass::Processor
    }

    fn init(&mut self, descriptor: &NodeDescriptor) -> TalonResult<()> {
        let NodeDescriptor::MotorMixer(desc) = descriptor else {
            return Err(TalonError::kind_mismatch(
                "motor_mixer descriptor",
                descriptor.kind(),
            ));
        };
        if desc.rate_hz == 0 {
            return Err(TalonError::config("bad rate: 0Hz"));
        }
        validate_geometry(&desc.params)?;

        self.rate_hz = desc.rate_hz;
        self.params = desc.params.clone();
        self.motors = vec![MotorState::default(); desc.params.motors.len()];
        self.outputs = (0..desc.params.motors.len())
            .map(|i| Stream::new(format!("{}/throttle_{}", self.name, i), desc.rate_hz))
            .collect::<TalonResult<_>>()?;
        Ok(())
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::MotorMixer(MotorMixerDescriptor {
            rate_hz: self.rate_hz,
            params: self.params.clone(),
        })
    }

    fn apply_config(&mut self, config: &NodeConfig) -> TalonResult<()> {
        let NodeConfig::MotorMixer(config) = config else {
            return Err(TalonError::kind_mismatch("motor_mixer config", config.kind()));
        };
        if let Some(params) = &config.params {
            // a symmetry failure leaves the previous geometry in effect; a
            // count change is caught per-tick so outputs never go stale
            validate_geometry(params)?;
        }
        self.config = config.clone();
        Ok(())
    }

    fn config(&self) -> NodeConfig {
        NodeConfig::MotorMixer(self.config.clone())
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec {
                name: "torque".into(),
                stream_type: StreamType::Torque,
                rate_hz: self.rate_hz,
            },
            PortSpec {
                name: "collective_force".into(),
                stream_type: StreamType::Force,
                rate_hz: self.rate_hz,
            },
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, stream)| OutputSpec {
                name: format!("throttle_{}", i),
                stream: stream.clone(),
            })
            .collect()
    }

    fn bind_input(&mut self, port_idx: usize, stream: Option<&StreamHandle>) -> TalonResult<()> {
        match port_idx {
            0 => {
                self.torque = match stream {
                    Some(handle) => StreamReader::bind(handle)?,
                    None => StreamReader::unbound(),
                }
            }
            1 => {
                self.force = match stream {
                    Some(handle) => StreamReader::bind(handle)?,
                    None => StreamReader::unbound(),
                }
            }
            _ => return Err(TalonError::invalid_input("no such port")),
        }
        Ok(())
    }

    fn process(&mut self, _ctx: &TickCtx) {
        for output in &self.outputs {
            output.clear();
        }

        let (Some(torque_samples), Some(force_samples)) =
            (self.torque.samples(), self.force.samples())
        else {
            return;
        };

        if self.active_params().motors.len() != self.outputs.len() {
            let err = TalonError::GeometryChanged(format!(
                "{} motors configured, {} at init",
                self.active_params().motors.len(),
                self.outputs.len()
            ));
            warn!(node = %self.name, %err, "skipping tick");
            self.stats.record(&err);
            return;
        }

        if let Err(err) = self.accumulator.accumulate(&torque_samples, &force_samples) {
            warn!(node = %self.name, %err, "input streams diverged");
            self.stats.record(&err);
        }

        while let Some((torque, force)) = self.accumulator.pop() {
            let throttles = self.compute_throttles(torque.value.0, force.value.0);
            let is_healthy = torque.is_healthy && force.is_healthy;
            for (output, throttle) in self.outputs.iter().zip(throttles) {
                output.push_with_health(Throttle(throttle), torque.timestamp_us, is_healthy);
            }
        }
    }

    fn stats(&self) -> NodeStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use talon_core::graph::MotorGeometry;

    fn quad_params() -> MultirotorParams {
        MultirotorParams::quad_x(0.25, 10.0, 0.2)
    }

    fn mixer_with(params: MultirotorParams) -> MotorMixerNode {
        let mut mixer = MotorMixerNode::new("mixer");
        mixer
            .init(&NodeDescriptor::MotorMixer(MotorMixerDescriptor {
                rate_hz: 100,
                params,
            }))
            .unwrap();
        mixer
    }

    fn signed_torque_sum(params: &MultirotorParams, throttles: &[f32]) -> Vector3<f32> {
        let axis = thrust_axis();
        let mut total = Vector3::zeros();
        for (motor, throttle) in params.motors.iter().zip(throttles) {
            let thrust = throttle * throttle * params.motor_thrust;
            let sign = if motor.clockwise { 1.0 } else { -1.0 };
            total += motor.position.cross(&(axis * thrust));
            total += axis * (params.motor_z_torque * sign * thrust / params.motor_thrust);
        }
        total
    }

    // =========================================================================
    // Geometry validation
    // =========================================================================

    #[test]
    fn test_symmetric_quad_accepted() {
        assert!(validate_geometry(&quad_params()).is_ok());
    }

    #[test]
    fn test_off_center_motor_rejected() {
        let mut params = quad_params();
        params.motors[0].position = Vector3::new(0.5, 0.25, 0.0);
        let err = validate_geometry(&params).unwrap_err();
        assert!(matches!(err, TalonError::AsymmetricGeometry(_)));

        // and init refuses to produce outputs for such a frame
        let mut mixer = MotorMixerNode::new("mixer");
        let result = mixer.init(&NodeDescriptor::MotorMixer(MotorMixerDescriptor {
            rate_hz: 100,
            params,
        }));
        assert!(matches!(result, Err(TalonError::AsymmetricGeometry(_))));
        assert!(mixer.outputs().is_empty());
    }

    #[test]
    fn test_unbalanced_rotation_rejected() {
        let mut params = quad_params();
        for motor in &mut params.motors {
            motor.clockwise = true;
        }
        assert!(matches!(
            validate_geometry(&params),
            Err(TalonError::AsymmetricGeometry(_))
        ));
    }

    #[test]
    fn test_apply_config_is_idempotent() {
        let mut mixer = mixer_with(quad_params());
        let mut params = quad_params();
        params.motor_z_torque = 0.25;
        let config = NodeConfig::MotorMixer(MotorMixerConfig {
            params: Some(params),
        });
        mixer.apply_config(&config).unwrap();
        let after_once = (mixer.config(), mixer.active_params().clone());
        mixer.apply_config(&config).unwrap();
        assert_eq!(after_once.0, mixer.config());
        assert_eq!(&after_once.1, mixer.active_params());
    }

    #[test]
    fn test_bad_config_keeps_previous_geometry() {
        let mut mixer = mixer_with(quad_params());
        let mut bad = quad_params();
        bad.motors[0].position = Vector3::new(0.5, 0.25, 0.0);
        let err = mixer.apply_config(&NodeConfig::MotorMixer(MotorMixerConfig {
            params: Some(bad),
        }));
        assert!(err.is_err());
        assert_eq!(mixer.active_params(), &quad_params());
    }

    // =========================================================================
    // Mixing
    // =========================================================================

    #[test]
    fn test_pure_hover_equal_throttles() {
        let mut mixer = mixer_with(quad_params());
        let throttles =
            mixer.compute_throttles(Vector3::zeros(), Vector3::new(0.0, 0.0, 9.81));
        assert_eq!(throttles.len(), 4);
        // sqrt(9.81 / 4 / 10)
        for throttle in &throttles {
            assert_relative_eq!(*throttle, 0.4952, epsilon = 1e-3);
        }
        let residual = signed_torque_sum(&quad_params(), &throttles);
        assert!(residual.norm() < 1e-3);
    }

    #[test]
    fn test_yaw_splits_rotation_directions() {
        let params = quad_params();
        let mut mixer = mixer_with(params.clone());
        let throttles =
            mixer.compute_throttles(Vector3::new(0.0, 0.0, 0.3), Vector3::new(0.0, 0.0, 9.81));

        let hover = 0.4952f32;
        for (motor, throttle) in params.motors.iter().zip(&throttles) {
            if motor.clockwise {
                assert!(*throttle > hover, "clockwise motor should throttle up");
            } else {
                assert!(*throttle < hover, "counterclockwise motor should throttle down");
            }
        }
        assert!(throttles.iter().all(|t| (0.0..=1.0).contains(t)));
    }

    #[test]
    fn test_reachable_yaw_preserves_mean_thrust() {
        // a yaw torque inside the dynamic range: thrust shifts between the
        // rotation directions but the collective stays put
        let params = quad_params();
        let mut mixer = mixer_with(params.clone());
        let throttles =
            mixer.compute_throttles(Vector3::new(0.0, 0.0, 0.04), Vector3::new(0.0, 0.0, 9.81));

        let mean_thrust: f32 = throttles
            .iter()
            .map(|t| t * t * params.motor_thrust)
            .sum::<f32>()
            / 4.0;
        assert_relative_eq!(mean_thrust, 9.81 / 4.0, max_relative = 0.01);

        let achieved = signed_torque_sum(&params, &throttles);
        assert_relative_eq!(achieved.z, 0.04, epsilon = 0.01);
    }

    #[test]
    fn test_negative_collective_idles_at_min_thrust() {
        let mut mixer = mixer_with(quad_params());
        let throttles =
            mixer.compute_throttles(Vector3::zeros(), Vector3::new(0.0, 0.0, -5.0));
        let min_throttle = throttle_from_thrust(10.0, MIN_THRUST);
        for throttle in throttles {
            assert_relative_eq!(throttle, min_throttle, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_saturated_target_terminates_with_bounded_output() {
        // torque far beyond the frame's authority: the loop must stop on
        // stabilization and still emit sane throttles
        let mut mixer = mixer_with(quad_params());
        let throttles =
            mixer.compute_throttles(Vector3::new(50.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 9.81));
        assert!(throttles.iter().all(|t| (0.0..=1.0).contains(t)));
    }

    #[test]
    fn test_geometry_count_change_skips_tick() {
        let mut mixer = mixer_with(quad_params());

        let torque = Stream::<Torque>::new("tg/out", 100).unwrap();
        let force = Stream::<Force>::new("fg/out", 100).unwrap();
        let torque_handle: StreamHandle = torque.clone();
        let force_handle: StreamHandle = force.clone();
        mixer.bind_input(0, Some(&torque_handle)).unwrap();
        mixer.bind_input(1, Some(&force_handle)).unwrap();

        // hexa config on a quad-initialized mixer
        let mut hexa = quad_params();
        hexa.motors.push(MotorGeometry {
            position: Vector3::new(0.0, 0.35, 0.0),
            clockwise: true,
        });
        hexa.motors.push(MotorGeometry {
            position: Vector3::new(0.0, -0.35, 0.0),
            clockwise: false,
        });
        mixer
            .apply_config(&NodeConfig::MotorMixer(MotorMixerConfig { params: Some(hexa) }))
            .unwrap();

        torque.push(Torque(Vector3::zeros()), 10_000);
        force.push(Force(Vector3::new(0.0, 0.0, 9.81)), 10_000);
        mixer.process(&TickCtx {
            tick: 0,
            now_us: 10_000,
            dt_us: 10_000,
        });

        for output in &mixer.outputs {
            assert_eq!(output.len(), 0, "tick must be skipped");
        }
        let stats = Node::stats(&mixer);
        assert_eq!(stats.error_count, 1);
        assert!(stats.last_error.unwrap().contains("geometry changed"));
    }

    #[test]
    fn test_process_emits_one_sample_per_input_pair() {
        let mut mixer = mixer_with(quad_params());
        let torque = Stream::<Torque>::new("tg/out", 100).unwrap();
        let force = Stream::<Force>::new("fg/out", 100).unwrap();
        let torque_handle: StreamHandle = torque.clone();
        let force_handle: StreamHandle = force.clone();
        mixer.bind_input(0, Some(&torque_handle)).unwrap();
        mixer.bind_input(1, Some(&force_handle)).unwrap();

        for i in 0..3u64 {
            torque.push(Torque(Vector3::zeros()), 10_000 * (i + 1));
            force.push(Force(Vector3::new(0.0, 0.0, 9.81)), 10_000 * (i + 1));
        }
        mixer.process(&TickCtx {
            tick: 0,
            now_us: 30_000,
            dt_us: 30_000,
        });

        for output in &mixer.outputs {
            let samples = output.samples();
            assert_eq!(samples.len(), 3);
            assert_eq!(samples[0].timestamp_us, 10_000);
            assert!(samples.iter().all(|s| s.is_healthy));
        }
    }
}
