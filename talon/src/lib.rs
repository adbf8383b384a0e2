//! # TALON - flight-control dataflow core
//!
//! TALON composes sensors, estimators, controllers and actuator sinks into a
//! periodically executed dataflow graph, producing motor throttle commands
//! from pilot sticks and onboard sensors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use talon::prelude::*;
//!
//! let registry = talon::library::standard_registry();
//! let catalog = talon::library::standard_catalog(&registry);
//!
//! let mut graph = Graph::new();
//! let params = MultirotorParams::quad_x(0.25, 10.0, 0.2);
//! graph.add_node(
//!     &catalog,
//!     "plant",
//!     &NodeDescriptor::MultirotorSimulator(
//!         MultirotorSimulatorDescriptor::with_default_rates(params),
//!     ),
//! ).unwrap();
//!
//! let mut scheduler = Scheduler::new(graph);
//! scheduler.run_for(std::time::Duration::from_secs(1)).unwrap();
//! ```
//!
//! ## Features
//!
//! - **Typed, rate-tagged streams** validated at bind time
//! - **Deterministic fixed-tick scheduling** with an explicit one-tick
//!   plant-feedback delay
//! - **Standard library** of sources, processors, sinks and a reference
//!   plant
//! - **Remote command surface** with packed stream telemetry

// Re-export core components
pub use talon_core::{self, *};

// Re-export the standard library with an alias
pub use talon_library as library;

// Re-export serde at crate root for descriptor/config derives downstream
pub use serde;

/// The TALON prelude - everything you need to get started
///
/// Just add `use talon::prelude::*;`.
pub mod prelude {
    // ============================================
    // Core node types
    // ============================================
    pub use talon_core::graph::{
        Graph, Node, NodeCatalog, NodeClass, NodeConfig, NodeDef, NodeDescriptor, NodeStats,
        OutputSpec, PortSpec, TickCtx,
    };

    // ============================================
    // Descriptors & configs
    // ============================================
    pub use talon_core::graph::{
        AmmeterConfig, AmmeterDescriptor, BarometerConfig, BarometerDescriptor,
        GeneratorDescriptor, MotorGeometry, MotorMixerConfig, MotorMixerDescriptor,
        MotorOutputConfig, MotorOutputDescriptor, MultirotorParams, MultirotorSimulatorConfig,
        MultirotorSimulatorDescriptor, ScalarGeneratorConfig, SimulatorNoise,
        VectorGeneratorConfig,
    };

    // ============================================
    // Streams
    // ============================================
    pub use talon_core::stream::{
        Sample, Stream, StreamHandle, StreamReader, StreamSpec, StreamType,
    };

    // ============================================
    // Scheduling
    // ============================================
    pub use talon_core::scheduling::{Scheduler, SchedulerConfig};

    // ============================================
    // Type system
    // ============================================
    pub use talon_core::defs::{TreeValue, TypeRegistry, Value};

    // ============================================
    // Errors
    // ============================================
    pub use talon_core::error::{TalonError, TalonResult};

    // ============================================
    // Remote surface
    // ============================================
    pub use talon_core::comms::{Command, RemoteHandler, Reply, Request, Response};

    // ============================================
    // Standard nodes
    // ============================================
    pub use talon_library::nodes::{
        AmmeterNode, BarometerNode, ForceGeneratorNode, MotorMixerNode, MotorOutputNode,
        MultirotorSimulatorNode, ScalarGeneratorNode, TorqueGeneratorNode,
    };
    pub use talon_library::{standard_catalog, standard_registry};
}
