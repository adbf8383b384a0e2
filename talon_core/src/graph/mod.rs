//! Node contract, catalog and the wired stream graph
//!
//! A graph is a set of named node instances plus a binding table mapping
//! `(consumer, port index)` to a producer's stream id. Nodes come from the
//! [`NodeCatalog`] as `(kind, descriptor)` pairs; descriptors fix a node's
//! shape at init, configs tune it afterwards. Validation enforces exact
//! element-type and rate matches on every binding and rejects cycles, except
//! through the single designated plant node whose outputs are read with a
//! one-tick delay.

mod catalog;
#[allow(clippy::module_inception)]
mod graph;
mod node;
mod params;

pub use catalog::{NodeCatalog, NodeDef};
pub use graph::Graph;
pub use node::{Node, NodeClass, NodeStats, OutputSpec, PortSpec, TickCtx};
pub use params::{
    AmmeterConfig, AmmeterDescriptor, BarometerConfig, BarometerDescriptor, GeneratorDescriptor,
    MotorGeometry, MotorMixerConfig, MotorMixerDescriptor, MotorOutputConfig,
    MotorOutputDescriptor, MultirotorParams, MultirotorSimulatorConfig,
    MultirotorSimulatorDescriptor, NodeConfig, NodeDescriptor, ScalarGeneratorConfig,
    SimulatorNoise, VectorGeneratorConfig,
};
