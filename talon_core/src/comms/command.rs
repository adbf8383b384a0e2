//! Remote command records

use serde::{Deserialize, Serialize};

use crate::defs::TreeValue;
use crate::graph::{NodeClass, NodeConfig, NodeDef, NodeDescriptor, NodeStats, PortSpec};
use crate::stream::StreamSpec;

/// One input port with its current binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePortState {
    pub spec: PortSpec,
    /// Stream id the port is bound to, if any
    pub bound_stream: Option<String>,
}

/// Everything a remote needs to render one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub name: String,
    pub kind: String,
    pub class: NodeClass,
    pub descriptor: NodeDescriptor,
    pub config: NodeConfig,
    pub inputs: Vec<NodePortState>,
    pub outputs: Vec<StreamSpec>,
    pub stats: NodeStats,
}

/// A remote call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// The remote's monotonic clock, for telemetry timestamp correlation
    Clock { us: u64 },
    EnumerateNodeDefs,
    EnumerateNodes,
    GetNodeData { name: String },
    AddNode { name: String, descriptor: NodeDescriptor },
    RemoveNode { name: String },
    SetNodeConfig { name: String, config: NodeConfig },
    SetNodeInputStreamPath {
        name: String,
        port_idx: usize,
        stream_id: String,
    },
    SendNodeMessage { name: String, message: TreeValue },
    SetStreamTelemetryActive { stream_id: String, active: bool },
}

/// A command with its request id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub request_id: u32,
    pub command: Command,
}

/// What a command produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Ack,
    Clock { us: u64 },
    NodeDefs(Vec<NodeDef>),
    Nodes(Vec<NodeState>),
    NodeData(Box<NodeState>),
    Message(TreeValue),
    Error(String),
}

/// A response echoing its request id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub request_id: u32,
    pub response: Response,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AmmeterDescriptor, NodeDescriptor};

    #[test]
    fn test_command_serde_round_trip() {
        let req = Request {
            request_id: 7,
            command: Command::AddNode {
                name: "amp".into(),
                descriptor: NodeDescriptor::Ammeter(AmmeterDescriptor { rate_hz: 100 }),
            },
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request_id, 7);
        assert!(matches!(back.command, Command::AddNode { ref name, .. } if name == "amp"));
    }
}
