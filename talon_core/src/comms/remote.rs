//! Command dispatch against a live graph

use std::collections::HashSet;

use tracing::{info, warn};

use crate::comms::command::{Command, NodePortState, NodeState, Reply, Request, Response};
use crate::comms::telemetry::{encode_frame, TelemetryFrame};
use crate::error::{TalonError, TalonResult};
use crate::graph::{Graph, NodeCatalog};

/// Executes remote commands and taps streams for telemetry
///
/// Owns the node catalog and the set of telemetry-active stream ids; the
/// graph itself stays with the scheduler and is borrowed per call.
pub struct RemoteHandler {
    catalog: NodeCatalog,
    telemetry_active: HashSet<String>,
    /// Last clock value the remote reported
    remote_clock_us: Option<u64>,
}

impl RemoteHandler {
    pub fn new(catalog: NodeCatalog) -> Self {
        Self {
            catalog,
            telemetry_active: HashSet::new(),
            remote_clock_us: None,
        }
    }

    pub fn catalog(&self) -> &NodeCatalog {
        &self.catalog
    }

    /// Execute one command, echoing its request id
    pub fn handle(&mut self, graph: &mut Graph, request: Request) -> Reply {
        let response = match self.dispatch(graph, request.command) {
            Ok(response) => response,
            Err(err) => {
                warn!(request_id = request.request_id, error = %err, "command failed");
                Response::Error(err.to_string())
            }
        };
        Reply {
            request_id: request.request_id,
            response,
        }
    }

    fn dispatch(&mut self, graph: &mut Graph, command: Command) -> TalonResult<Response> {
        match command {
            Command::Clock { us } => {
                self.remote_clock_us = Some(us);
                Ok(Response::Clock { us })
            }
            Command::EnumerateNodeDefs => Ok(Response::NodeDefs(self.catalog.defs().to_vec())),
            Command::EnumerateNodes => {
                let states = graph
                    .node_names()
                    .iter()
                    .map(|name| self.node_state(graph, name))
                    .collect::<TalonResult<Vec<_>>>()?;
                Ok(Response::Nodes(states))
            }
            Command::GetNodeData { name } => {
                Ok(Response::NodeData(Box::new(self.node_state(graph, &name)?)))
            }
            Command::AddNode { name, descriptor } => {
                graph.add_node(&self.catalog, &name, &descriptor)?;
                info!(node = %name, kind = descriptor.kind(), "node added remotely");
                Ok(Response::NodeData(Box::new(self.node_state(graph, &name)?)))
            }
            Command::RemoveNode { name } => {
                graph.remove_node(&name)?;
                // anything we were still tapping from that node is gone
                self.telemetry_active
                    .retain(|id| id.split('/').next() != Some(name.as_str()));
                Ok(Response::Ack)
            }
            Command::SetNodeConfig { name, config } => {
                graph.set_config(&name, &config)?;
                Ok(Response::Ack)
            }
            Command::SetNodeInputStreamPath {
                name,
                port_idx,
                stream_id,
            } => {
                graph.set_input_path(&name, port_idx, &stream_id)?;
                Ok(Response::Ack)
            }
            Command::SendNodeMessage { name, message } => {
                let node = graph
                    .node_mut(&name)
                    .ok_or_else(|| TalonError::node(&name, "not found"))?;
                Ok(Response::Message(node.send_message(&message)?))
            }
            Command::SetStreamTelemetryActive { stream_id, active } => {
                if active {
                    if graph.stream(&stream_id).is_none() {
                        return Err(TalonError::UnknownStream(stream_id));
                    }
                    self.telemetry_active.insert(stream_id);
                } else {
                    self.telemetry_active.remove(&stream_id);
                }
                Ok(Response::Ack)
            }
        }
    }

    fn node_state(&self, graph: &Graph, name: &str) -> TalonResult<NodeState> {
        let node = graph
            .node(name)
            .ok_or_else(|| TalonError::node(name, "not found"))?;
        let inputs = node
            .inputs()
            .into_iter()
            .enumerate()
            .map(|(idx, spec)| NodePortState {
                spec,
                bound_stream: graph.binding(name, idx).map(str::to_string),
            })
            .collect();
        let outputs = node.outputs().iter().map(|o| o.stream.spec()).collect();
        Ok(NodeState {
            name: name.to_string(),
            kind: node.kind().to_string(),
            class: node.class(),
            descriptor: node.descriptor(),
            config: node.config(),
            inputs,
            outputs,
            stats: node.stats(),
        })
    }

    /// Stream ids currently tapped for telemetry
    pub fn telemetry_active(&self) -> impl Iterator<Item = &str> {
        self.telemetry_active.iter().map(String::as_str)
    }

    /// Encode this tick's samples of every tapped stream
    ///
    /// Call after the tick has run, before the next one clears the buffers.
    pub fn collect_telemetry(&self, graph: &Graph) -> Vec<TelemetryFrame> {
        let mut ids: Vec<&String> = self.telemetry_active.iter().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| graph.stream(id))
            .map(|stream| encode_frame(stream.as_ref()))
            .collect()
    }
}
