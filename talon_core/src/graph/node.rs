//! The contract every node implements

use serde::{Deserialize, Serialize};

use crate::defs::TreeValue;
use crate::error::{TalonError, TalonResult};
use crate::graph::params::{NodeConfig, NodeDescriptor};
use crate::stream::{StreamHandle, StreamType};

/// What role a node plays in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeClass {
    /// Only outputs (sensors)
    Source,
    /// Only inputs (actuators, taps)
    Sink,
    /// Inputs and outputs
    Processor,
    /// Parameterized source
    Generator,
    /// The virtual plant; its outputs are read with a one-tick delay
    Simulator,
}

impl std::fmt::Display for NodeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeClass::Source => "source",
            NodeClass::Sink => "sink",
            NodeClass::Processor => "processor",
            NodeClass::Generator => "generator",
            NodeClass::Simulator => "simulator",
        };
        f.write_str(name)
    }
}

/// Declared shape of an input port; fixed at node init
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub stream_type: StreamType,
    pub rate_hz: u32,
}

/// An output stream a node allocated at init
pub struct OutputSpec {
    pub name: String,
    pub stream: StreamHandle,
}

/// Per-node degradation counters, surfaced over telemetry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStats {
    pub error_count: u64,
    pub last_error: Option<String>,
}

impl NodeStats {
    /// Record a recovered runtime error
    pub fn record(&mut self, err: &TalonError) {
        self.error_count += 1;
        self.last_error = Some(err.to_string());
    }
}

/// Per-tick context handed to `process`
#[derive(Debug, Clone, Copy)]
pub struct TickCtx {
    /// Tick counter, starting at 0
    pub tick: u64,
    /// Tick timestamp, monotonic microseconds since scheduler start
    pub now_us: u64,
    /// Nominal tick period
    pub dt_us: u64,
}

/// A node instance in the graph
///
/// `init` fixes the node's shape (ports and output streams) once;
/// `apply_config` is idempotent, never invalidates output stream identities,
/// and on failure leaves the previous valid config in place. `process` must
/// not fail: error conditions degrade to unhealthy samples and a bumped
/// [`NodeStats`] counter.
pub trait Node {
    /// Catalog kind name
    fn kind(&self) -> &'static str;

    /// Instance name, unique in the graph
    fn name(&self) -> &str;

    fn class(&self) -> NodeClass;

    /// One-time shape fixation; allocates output streams
    fn init(&mut self, descriptor: &NodeDescriptor) -> TalonResult<()>;

    fn descriptor(&self) -> NodeDescriptor;

    fn apply_config(&mut self, config: &NodeConfig) -> TalonResult<()>;

    fn config(&self) -> NodeConfig;

    fn inputs(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        Vec::new()
    }

    /// Attach or detach the stream feeding an input port
    ///
    /// The graph has already checked type and rate against the port spec;
    /// implementations downcast and keep a weak reader.
    fn bind_input(&mut self, port_idx: usize, stream: Option<&StreamHandle>) -> TalonResult<()> {
        let _ = (port_idx, stream);
        Err(TalonError::invalid_input("node has no inputs"))
    }

    /// Out-of-band tunable requests (calibrate, reset, query state)
    fn send_message(&mut self, message: &TreeValue) -> TalonResult<TreeValue> {
        let _ = message;
        Err(TalonError::invalid_input("node accepts no messages"))
    }

    /// Called by the scheduler once before the first `process`
    fn start(&mut self, origin_us: u64) {
        let _ = origin_us;
    }

    /// The scheduled step
    fn process(&mut self, ctx: &TickCtx);

    fn stats(&self) -> NodeStats {
        NodeStats::default()
    }
}
