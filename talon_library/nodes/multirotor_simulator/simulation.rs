//! Rigid-body multirotor dynamics
//!
//! The reference plant integrated when real hardware is absent. Forces:
//! per-motor square-law thrust along the body thrust axis, reactive yaw
//! torque signed by rotation direction, gravity, linear + quadratic drag and
//! a ground plane with penetration resolution, each individually toggleable.
//! Motors follow commanded throttle with first-order spin-up/spin-down
//! limits.
//!
//! Integration runs in fixed 1 ms substeps so sensor pacing sees a smooth
//! time series regardless of the scheduler tick.

use nalgebra::{UnitQuaternion, Vector3};

use talon_core::error::{TalonError, TalonResult};
use talon_core::graph::MultirotorParams;

const GRAVITY: f32 = 9.81;
/// Linear drag coefficient, N·s/m
const LINEAR_DRAG: f32 = 0.05;
/// Quadratic drag coefficient, N·s²/m²
const QUADRATIC_DRAG: f32 = 0.01;
/// Ground contact damping applied to lateral and angular motion, 1/s
const GROUND_FRICTION: f32 = 8.0;
/// Sonar-style proximity sensing ceiling, m
const PROXIMITY_RANGE: f32 = 6.0;
/// Integration substep
const SUBSTEP_US: u64 = 1_000;

/// World-frame magnetic field at the reference origin, µT (ENU)
fn world_magnetic_field() -> Vector3<f32> {
    Vector3::new(0.0, 21.5, -39.8)
}

/// Everything a sensor can observe about the vehicle
#[derive(Debug, Clone)]
pub struct UavState {
    /// ENU position relative to the origin, m
    pub enu_position: Vector3<f32>,
    /// ENU velocity, m/s
    pub enu_velocity: Vector3<f32>,
    /// Body-to-world rotation
    pub attitude: UnitQuaternion<f32>,
    /// Body-frame angular velocity, rad/s
    pub angular_velocity: Vector3<f32>,
    /// Body-frame specific force (what an accelerometer reads), m/s²
    pub acceleration: Vector3<f32>,
    /// Body-frame magnetic field, µT
    pub magnetic_field: Vector3<f32>,
    /// Barometric pressure, Pa
    pub pressure: f64,
    /// Air temperature, °C
    pub temperature: f32,
    /// Distance to ground along the body down axis; 0 when out of range
    pub proximity_distance: f32,
}

impl Default for UavState {
    fn default() -> Self {
        Self {
            enu_position: Vector3::zeros(),
            enu_velocity: Vector3::zeros(),
            attitude: UnitQuaternion::identity(),
            angular_velocity: Vector3::zeros(),
            acceleration: Vector3::new(0.0, 0.0, GRAVITY),
            magnetic_field: world_magnetic_field(),
            pressure: pressure_at_altitude(0.0),
            temperature: temperature_at_altitude(0.0),
            proximity_distance: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MotorSim {
    /// Commanded throttle, 0..1
    target: f32,
    /// Current throttle after spin-up/down limiting
    throttle: f32,
}

/// The integrating plant
pub struct MultirotorSimulation {
    params: MultirotorParams,
    motors: Vec<MotorSim>,
    state: UavState,
    inertia: f32,
    pub gravity_enabled: bool,
    pub ground_enabled: bool,
    pub drag_enabled: bool,
    pub simulation_enabled: bool,
}

impl MultirotorSimulation {
    pub fn new(params: MultirotorParams) -> TalonResult<Self> {
        if params.motors.is_empty() {
            return Err(TalonError::config("multirotor needs at least one motor"));
        }
        if params.mass <= 0.0 {
            return Err(TalonError::config("multirotor mass must be positive"));
        }
        if params.motor_acceleration < 0.0 || params.motor_deceleration < 0.0 {
            return Err(TalonError::config("motor spin rates must be non-negative"));
        }
        let inertia = moment_of_inertia(params.mass, params.radius, params.height);
        Ok(Self {
            motors: vec![MotorSim::default(); params.motors.len()],
            params,
            state: UavState::default(),
            inertia,
            gravity_enabled: true,
            ground_enabled: true,
            drag_enabled: true,
            simulation_enabled: true,
        })
    }

    pub fn state(&self) -> &UavState {
        &self.state
    }

    pub fn motor_count(&self) -> usize {
        self.motors.len()
    }

    pub fn set_motor_throttle(&mut self, index: usize, throttle: f32) {
        if let Some(motor) = self.motors.get_mut(index) {
            motor.target = throttle.clamp(0.0, 1.0);
        }
    }

    /// Back to the initial resting state, motors stopped
    pub fn reset(&mut self) {
        self.state = UavState::default();
        for motor in &mut self.motors {
            *motor = MotorSim::default();
        }
    }

    /// Kill all motion but keep pose and motor commands
    pub fn stop_motion(&mut self) {
        self.state.enu_velocity = Vector3::zeros();
        self.state.angular_velocity = Vector3::zeros();
    }

    /// Advance by `dt_us`, invoking `observe` after every substep
    pub fn process<F>(&mut self, dt_us: u64, mut observe: F)
    where
        F: FnMut(&Self, u64),
    {
        let mut remaining = dt_us;
        while remaining > 0 {
            let sub = remaining.min(SUBSTEP_US);
            if self.simulation_enabled {
                self.step(sub as f32 * 1e-6);
            }
            observe(self, sub);
            remaining -= sub;
        }
    }

    fn step(&mut self, dt: f32) {
        let axis = Vector3::z();

        // first-order motor response toward the commanded throttle
        for motor in &mut self.motors {
            let delta = (motor.target - motor.throttle).clamp(
                -self.params.motor_deceleration * dt,
                self.params.motor_acceleration * dt,
            );
            motor.throttle += delta;
        }

        // thrust and torque in the body frame
        let mut thrust_total = 0.0;
        let mut torque = Vector3::zeros();
        for (motor, geometry) in self.motors.iter().zip(&self.params.motors) {
            let thrust = motor.throttle * motor.throttle * self.params.motor_thrust;
            thrust_total += thrust;
            torque += geometry.position.cross(&(axis * thrust));
            let sign = if geometry.clockwise { 1.0 } else { -1.0 };
            torque +=
                axis * (self.params.motor_z_torque * sign * thrust / self.params.motor_thrust);
        }

        let gravity = if self.gravity_enabled {
            Vector3::new(0.0, 0.0, -GRAVITY)
        } else {
            Vector3::zeros()
        };

        let mut force_w = self.state.attitude * (axis * thrust_total);
        force_w += gravity * self.params.mass;
        if self.drag_enabled {
            let v = self.state.enu_velocity;
            force_w -= v * LINEAR_DRAG + v * v.norm() * QUADRATIC_DRAG;
        }

        let velocity_before = self.state.enu_velocity;
        self.state.enu_velocity += force_w / self.params.mass * dt;
        self.state.enu_position += self.state.enu_velocity * dt;

        self.state.angular_velocity += torque / self.inertia * dt;
        self.state.attitude *= UnitQuaternion::from_scaled_axis(self.state.angular_velocity * dt);

        // ground plane: resolve penetration, kill downward motion, bleed off
        // lateral and angular motion
        if self.ground_enabled && self.state.enu_position.z < 0.0 {
            self.state.enu_position.z = 0.0;
            if self.state.enu_velocity.z < 0.0 {
                self.state.enu_velocity.z = 0.0;
            }
            let damping = 1.0 - (GROUND_FRICTION * dt).min(1.0);
            self.state.enu_velocity.x *= damping;
            self.state.enu_velocity.y *= damping;
            self.state.angular_velocity *= damping;
        }

        // sensor-visible quantities
        let inverse = self.state.attitude.inverse();
        let kinematic_accel = (self.state.enu_velocity - velocity_before) / dt;
        self.state.acceleration = inverse * (kinematic_accel - gravity);
        self.state.magnetic_field = inverse * world_magnetic_field();
        let altitude = self.state.enu_position.z;
        self.state.pressure = pressure_at_altitude(altitude as f64);
        self.state.temperature = temperature_at_altitude(altitude);
        self.state.proximity_distance = proximity(altitude, &self.state.attitude);
    }
}

/// Thin uniform cylinder approximation
fn moment_of_inertia(mass: f32, radius: f32, height: f32) -> f32 {
    (1.0 / 12.0) * mass * (3.0 * radius * radius + height * height)
}

/// International barometric formula, Pa
fn pressure_at_altitude(altitude_m: f64) -> f64 {
    101_325.0 * (1.0 - 2.25577e-5 * altitude_m).powf(5.25588)
}

/// Standard lapse rate from 15 °C at sea level
fn temperature_at_altitude(altitude_m: f32) -> f32 {
    15.0 - 0.0065 * altitude_m
}

/// Sonar-style slant distance to the ground plane, 0 when out of range
fn proximity(altitude: f32, attitude: &UnitQuaternion<f32>) -> f32 {
    let down_alignment = (attitude * Vector3::z()).z;
    if altitude < 0.0 || down_alignment < 0.3 {
        return 0.0;
    }
    let slant = altitude / down_alignment;
    if slant > PROXIMITY_RANGE {
        0.0
    } else {
        slant
    }
}

// ---------------------------------------------------------------------------
// ENU <-> ECEF
// ---------------------------------------------------------------------------

/// WGS-84 geodetic reference for the local ENU frame
pub mod coords {
    use nalgebra::{Matrix3, Vector3};

    const WGS84_A: f64 = 6_378_137.0;
    const WGS84_E2: f64 = 6.694_379_990_14e-3;

    /// Fixed LLA origin of the ENU frame (radians, radians, meters)
    pub const ORIGIN_LAT_RAD: f64 = 41.390205 * std::f64::consts::PI / 180.0;
    pub const ORIGIN_LON_RAD: f64 = 2.154007 * std::f64::consts::PI / 180.0;
    pub const ORIGIN_ALT_M: f64 = 0.0;

    /// ECEF position of the ENU origin
    pub fn origin_ecef() -> Vector3<f64> {
        let (sin_lat, cos_lat) = ORIGIN_LAT_RAD.sin_cos();
        let (sin_lon, cos_lon) = ORIGIN_LON_RAD.sin_cos();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        Vector3::new(
            (n + ORIGIN_ALT_M) * cos_lat * cos_lon,
            (n + ORIGIN_ALT_M) * cos_lat * sin_lon,
            (n * (1.0 - WGS84_E2) + ORIGIN_ALT_M) * sin_lat,
        )
    }

    /// Rotation taking ENU vectors into the ECEF frame
    pub fn enu_to_ecef_rotation() -> Matrix3<f64> {
        let (sin_lat, cos_lat) = ORIGIN_LAT_RAD.sin_cos();
        let (sin_lon, cos_lon) = ORIGIN_LON_RAD.sin_cos();
        Matrix3::from_columns(&[
            Vector3::new(-sin_lon, cos_lon, 0.0),
            Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
            Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat),
        ])
    }

    /// Transform an ENU position into ECEF
    pub fn enu_to_ecef_position(enu: Vector3<f64>) -> Vector3<f64> {
        origin_ecef() + enu_to_ecef_rotation() * enu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use talon_core::graph::MultirotorParams;

    fn quad() -> MultirotorSimulation {
        MultirotorSimulation::new(MultirotorParams::quad_x(0.25, 10.0, 0.2)).unwrap()
    }

    #[test]
    fn test_rests_on_ground() {
        let mut sim = quad();
        sim.process(100_000, |_, _| {});
        let state = sim.state();
        assert_eq!(state.enu_position.z, 0.0);
        // accelerometer reads +1g upward at rest
        assert_relative_eq!(state.acceleration.z, GRAVITY, epsilon = 1e-3);
    }

    #[test]
    fn test_free_fall_without_ground() {
        let mut sim = quad();
        sim.ground_enabled = false;
        sim.drag_enabled = false;
        sim.process(1_000_000, |_, _| {});
        let state = sim.state();
        // one second of free fall: z ≈ -g/2, v ≈ -g
        assert_relative_eq!(state.enu_velocity.z, -GRAVITY, max_relative = 0.01);
        assert_relative_eq!(state.enu_position.z, -GRAVITY / 2.0, max_relative = 0.02);
        // the accelerometer reads ~0 in free fall
        assert!(state.acceleration.norm() < 0.1);
    }

    #[test]
    fn test_hover_throttle_lifts_off() {
        let mut sim = quad();
        sim.drag_enabled = false;
        // slightly above hover throttle for 1.2kg: thrust = 4·t²·10 > 11.77N
        let throttle = (1.3f32 * GRAVITY / 4.0 / 10.0).sqrt();
        for i in 0..4 {
            sim.set_motor_throttle(i, throttle);
        }
        sim.process(2_000_000, |_, _| {});
        assert!(sim.state().enu_position.z > 0.1, "should have climbed");
    }

    #[test]
    fn test_yaw_torque_spins_vehicle() {
        let mut sim = quad();
        sim.ground_enabled = false;
        sim.gravity_enabled = false;
        // only the clockwise pair spinning: net reactive yaw torque
        sim.set_motor_throttle(0, 0.8);
        sim.set_motor_throttle(2, 0.8);
        sim.process(500_000, |_, _| {});
        assert!(sim.state().angular_velocity.z.abs() > 0.01);
    }

    #[test]
    fn test_motor_first_order_response() {
        let mut sim = quad();
        sim.set_motor_throttle(0, 1.0);
        sim.process(50_000, |_, _| {});
        let throttle = sim.motors[0].throttle;
        // 50ms at 8 throttle/s spin-up: ~0.4, well short of the command
        assert!(throttle > 0.3 && throttle < 0.5, "got {}", throttle);
    }

    #[test]
    fn test_simulation_disable_freezes_state() {
        let mut sim = quad();
        sim.simulation_enabled = false;
        sim.ground_enabled = false;
        sim.process(1_000_000, |_, _| {});
        assert_eq!(sim.state().enu_position.z, 0.0);
    }

    #[test]
    fn test_substep_observer_sees_every_slice() {
        let mut sim = quad();
        let mut total = 0u64;
        let mut calls = 0;
        sim.process(10_500, |_, sub| {
            total += sub;
            calls += 1;
        });
        assert_eq!(total, 10_500);
        assert_eq!(calls, 11); // ten 1ms substeps plus the 0.5ms remainder
    }

    #[test]
    fn test_pressure_altitude_relation() {
        assert_relative_eq!(pressure_at_altitude(0.0), 101_325.0);
        let at_100m = pressure_at_altitude(100.0);
        // ~12 Pa per meter near sea level
        assert!(at_100m < 101_325.0 - 1_000.0 && at_100m > 101_325.0 - 1_400.0);
    }

    #[test]
    fn test_enu_to_ecef_origin_sanity() {
        let origin = coords::origin_ecef();
        // Barcelona is in the northern hemisphere, east of Greenwich
        assert!(origin.z > 4.0e6);
        assert!(origin.x > 0.0 && origin.y > 0.0);
        assert_relative_eq!(origin.norm(), 6.37e6, max_relative = 0.01);

        // moving 1m up in ENU moves radially outward in ECEF
        let up = coords::enu_to_ecef_position(nalgebra::Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(up.norm() - origin.norm(), 1.0, epsilon = 1e-3);
    }
}
