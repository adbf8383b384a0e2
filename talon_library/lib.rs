//! # TALON Standard Library
//!
//! The standard library of nodes and bus backends for the TALON
//! flight-control system.
//!
//! ## Structure
//!
//! ```text
//! talon_library/
//! ── nodes/          # Standard node kinds (generators, mixer, plant, ...)
//! ── drivers/        # Bus backends (simulation, platform)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use talon_core::graph::{
//!     Graph, GeneratorDescriptor, MotorMixerDescriptor, MultirotorParams, NodeDescriptor,
//! };
//! use talon_core::scheduling::Scheduler;
//! use talon_library::{standard_catalog, standard_registry};
//!
//! let registry = standard_registry();
//! let catalog = standard_catalog(&registry);
//!
//! let mut graph = Graph::new();
//! let params = MultirotorParams::quad_x(0.25, 10.0, 0.2);
//! graph.add_node(
//!     &catalog,
//!     "mixer",
//!     &NodeDescriptor::MotorMixer(MotorMixerDescriptor { rate_hz: 100, params }),
//! ).unwrap();
//! graph.add_node(
//!     &catalog,
//!     "torque",
//!     &NodeDescriptor::TorqueGenerator(GeneratorDescriptor { rate_hz: 100 }),
//! ).unwrap();
//! graph.set_input_path("mixer", 0, "torque/out").unwrap();
//!
//! let mut scheduler = Scheduler::new(graph);
//! scheduler.run_for(Duration::from_secs(1)).unwrap();
//! ```

pub mod drivers;
pub mod nodes;

use std::rc::Rc;

use talon_core::defs::{FieldDecl, TypeKind, TypeRegistry};
use talon_core::graph::{
    AmmeterDescriptor, BarometerDescriptor, GeneratorDescriptor, MotorMixerDescriptor,
    MotorOutputDescriptor, MultirotorParams, MultirotorSimulatorDescriptor, NodeCatalog,
    NodeClass, NodeDef, NodeDescriptor,
};

use drivers::SimulationBus;
use nodes::{
    AmmeterNode, BarometerNode, ForceGeneratorNode, MotorMixerNode, MotorOutputNode,
    MultirotorSimulatorNode, ScalarGeneratorNode, TorqueGeneratorNode,
};

// Re-export the standard nodes at the crate root for convenience
pub use nodes::{validate_geometry, MultirotorSimulation, UavState};

/// Register the library's message/state types into a registry
///
/// Currently: `uav_state`, the record served by the simulator's `get_state`
/// message.
pub fn register_library_types(registry: &mut TypeRegistry) {
    let vec3 = registry.builtin(TypeKind::Vec3);
    let vec4 = registry.builtin(TypeKind::Vec4);
    let f32_ty = registry.builtin(TypeKind::F32);
    let f64_ty = registry.builtin(TypeKind::F64);
    registry
        .declare_record(
            nodes::multirotor_simulator::UAV_STATE_TYPE,
            vec![
                FieldDecl::new("position", vec3),
                FieldDecl::new("velocity", vec3),
                FieldDecl::new("attitude", vec4),
                FieldDecl::new("angular_velocity", vec3),
                FieldDecl::new("pressure", f64_ty),
                FieldDecl::new("temperature", f32_ty),
                FieldDecl::new("proximity_distance", f32_ty),
            ],
            Default::default(),
        )
        .expect("library types registered twice");
}

/// A registry with built-ins plus the library types, ready to share
pub fn standard_registry() -> Rc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    register_library_types(&mut registry);
    Rc::new(registry)
}

/// The catalog of standard node kinds
///
/// Bus-attached kinds (barometer, motor output) are created on a fresh
/// [`SimulationBus`]; construct them directly with a real bus handle for
/// hardware runs.
pub fn standard_catalog(registry: &Rc<TypeRegistry>) -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    let default_params = MultirotorParams::quad_x(0.25, 10.0, 0.2);

    catalog.register(
        NodeDef {
            kind: "scalar_generator".into(),
            class: NodeClass::Generator,
            default_descriptor: NodeDescriptor::ScalarGenerator(GeneratorDescriptor {
                rate_hz: 100,
            }),
        },
        |name| Box::new(ScalarGeneratorNode::new(name)),
    );
    catalog.register(
        NodeDef {
            kind: "force_generator".into(),
            class: NodeClass::Generator,
            default_descriptor: NodeDescriptor::ForceGenerator(GeneratorDescriptor {
                rate_hz: 100,
            }),
        },
        |name| Box::new(ForceGeneratorNode::new(name)),
    );
    catalog.register(
        NodeDef {
            kind: "torque_generator".into(),
            class: NodeClass::Generator,
            default_descriptor: NodeDescriptor::TorqueGenerator(GeneratorDescriptor {
                rate_hz: 100,
            }),
        },
        |name| Box::new(TorqueGeneratorNode::new(name)),
    );
    catalog.register(
        NodeDef {
            kind: "ammeter".into(),
            class: NodeClass::Processor,
            default_descriptor: NodeDescriptor::Ammeter(AmmeterDescriptor { rate_hz: 100 }),
        },
        |name| Box::new(AmmeterNode::new(name)),
    );
    catalog.register(
        NodeDef {
            kind: "motor_mixer".into(),
            class: NodeClass::Processor,
            default_descriptor: NodeDescriptor::MotorMixer(MotorMixerDescriptor {
                rate_hz: 100,
                params: default_params.clone(),
            }),
        },
        |name| Box::new(MotorMixerNode::new(name)),
    );
    let sim_registry = registry.clone();
    catalog.register(
        NodeDef {
            kind: "multirotor_simulator".into(),
            class: NodeClass::Simulator,
            default_descriptor: NodeDescriptor::MultirotorSimulator(
                MultirotorSimulatorDescriptor::with_default_rates(default_params),
            ),
        },
        move |name| Box::new(MultirotorSimulatorNode::new(name, sim_registry.clone())),
    );
    catalog.register(
        NodeDef {
            kind: "barometer".into(),
            class: NodeClass::Source,
            default_descriptor: NodeDescriptor::Barometer(BarometerDescriptor { rate_hz: 50 }),
        },
        |name| {
            let bus = talon_core::bus::bus_handle(SimulationBus::with_ms5611_defaults(
                &format!("{}_bus", name),
            ));
            Box::new(BarometerNode::new(name, bus))
        },
    );
    catalog.register(
        NodeDef {
            kind: "motor_output".into(),
            class: NodeClass::Sink,
            default_descriptor: NodeDescriptor::MotorOutput(MotorOutputDescriptor {
                channels: 4,
                rate_hz: 100,
            }),
        },
        |name| {
            let bus =
                talon_core::bus::bus_handle(SimulationBus::new(&format!("{}_bus", name)));
            Box::new(MotorOutputNode::new(name, bus))
        },
    );
    catalog
}
