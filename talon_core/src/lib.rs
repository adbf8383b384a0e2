//! # TALON Core
//!
//! The graph runtime at the heart of the TALON flight-control system.
//!
//! TALON composes sensors, estimators, controllers and actuator sinks into a
//! periodically executed dataflow graph that turns pilot sticks and onboard
//! sensors into motor throttle commands. This crate provides the fundamental
//! building blocks:
//!
//! - **Defs**: a declarative type registry for descriptors, configs and
//!   node messages
//! - **Streams**: typed, rate-tagged channels of timestamped samples
//! - **Graph**: the node contract, kind catalog and validated wiring
//! - **Scheduling**: the single-threaded fixed-tick driver
//! - **Comms**: the remote command surface and telemetry packing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use talon_core::graph::Graph;
//! use talon_core::scheduling::Scheduler;
//!
//! let graph = Graph::new();
//! // ... add nodes, wire streams ...
//! let mut scheduler = Scheduler::new(graph);
//! scheduler.run_for(std::time::Duration::from_secs(1)).unwrap();
//! ```

pub mod bus;
pub mod comms;
pub mod defs;
pub mod error;
pub mod graph;
pub mod scheduling;
pub mod stream;

// Re-export commonly used types for easy access
pub use bus::{bus_handle, Bus, BusHandle};
pub use defs::{TreeValue, TypeRegistry, Value};
pub use error::{TalonError, TalonResult};
pub use graph::{Graph, Node, NodeCatalog, NodeClass, NodeStats, TickCtx};
pub use scheduling::{Scheduler, SchedulerConfig};
pub use stream::{Sample, Stream, StreamHandle, StreamReader, StreamType};
