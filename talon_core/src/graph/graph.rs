//! The wired node graph

use std::collections::HashMap;

use tracing::debug;

use crate::error::{TalonError, TalonResult};
use crate::graph::catalog::NodeCatalog;
use crate::graph::node::{Node, NodeClass, TickCtx};
use crate::graph::params::{NodeConfig, NodeDescriptor};
use crate::stream::StreamHandle;

struct NodeEntry {
    node: Box<dyn Node>,
}

/// A set of node instances wired by input-to-stream bindings
///
/// Nodes are kept in init order; teardown drops them in reverse. The
/// execution order is recomputed on every topology change: a topological sort
/// of the binding digraph, with edges out of the designated plant node
/// reversed so every consumer of plant streams runs before the plant
/// overwrites them (that is what makes the feedback delay exactly one tick).
#[derive(Default)]
pub struct Graph {
    entries: Vec<NodeEntry>,
    by_name: HashMap<String, usize>,
    streams: HashMap<String, StreamHandle>,
    /// (consumer name, port index) -> stream id
    bindings: HashMap<(String, usize), String>,
    plant: Option<String>,
    order: Vec<usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Topology changes
    // ------------------------------------------------------------------

    /// Create a node from the catalog, init it and register its streams
    pub fn add_node(
        &mut self,
        catalog: &NodeCatalog,
        name: &str,
        descriptor: &NodeDescriptor,
    ) -> TalonResult<()> {
        if self.by_name.contains_key(name) {
            return Err(TalonError::DuplicateNodeName(name.to_string()));
        }
        let mut node = catalog.create(descriptor.kind(), name)?;
        node.init(descriptor)?;
        self.insert_node(node)
    }

    /// Register an already-initialized node (tests, bus-wired constructors)
    pub fn insert_node(&mut self, node: Box<dyn Node>) -> TalonResult<()> {
        let name = node.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(TalonError::DuplicateNodeName(name));
        }

        let outputs = node.outputs();
        for output in &outputs {
            let id = output.stream.id().to_string();
            if self.streams.contains_key(&id) {
                return Err(TalonError::invalid_input(format!(
                    "stream id '{}' already has an owner",
                    id
                )));
            }
        }

        if node.class() == NodeClass::Simulator {
            if let Some(existing) = &self.plant {
                return Err(TalonError::invalid_input(format!(
                    "plant node already designated: '{}'",
                    existing
                )));
            }
            self.plant = Some(name.clone());
        }

        for output in outputs {
            self.streams
                .insert(output.stream.id().to_string(), output.stream);
        }
        self.by_name.insert(name.clone(), self.entries.len());
        self.entries.push(NodeEntry { node });
        self.recompute_order()?;
        debug!(node = %name, "node added");
        Ok(())
    }

    /// Remove a node, unbinding every consumer of its streams
    pub fn remove_node(&mut self, name: &str) -> TalonResult<()> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| TalonError::node(name, "not found"))?;

        // detach consumers bound to this node's outputs
        let owned: Vec<String> = self
            .streams
            .keys()
            .filter(|id| id.split('/').next() == Some(name))
            .cloned()
            .collect();
        let stale: Vec<(String, usize)> = self
            .bindings
            .iter()
            .filter(|(_, path)| owned.contains(path))
            .map(|(k, _)| k.clone())
            .collect();
        for (consumer, port_idx) in stale {
            if let Some(&cidx) = self.by_name.get(&consumer) {
                let _ = self.entries[cidx].node.bind_input(port_idx, None);
            }
            self.bindings.remove(&(consumer, port_idx));
        }

        // this node's own bindings
        self.bindings.retain(|(consumer, _), _| consumer != name);

        for id in owned {
            self.streams.remove(&id);
        }
        if self.plant.as_deref() == Some(name) {
            self.plant = None;
        }
        self.entries.remove(idx);
        self.reindex();
        self.recompute_order()?;
        debug!(node = %name, "node removed");
        Ok(())
    }

    /// Bind an input port to a stream path; an empty path unbinds
    pub fn set_input_path(
        &mut self,
        name: &str,
        port_idx: usize,
        path: &str,
    ) -> TalonResult<()> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| TalonError::node(name, "not found"))?;
        let ports = self.entries[idx].node.inputs();
        let port = ports.get(port_idx).ok_or_else(|| {
            TalonError::invalid_input(format!("node '{}' has no port {}", name, port_idx))
        })?;

        if path.is_empty() {
            self.entries[idx].node.bind_input(port_idx, None)?;
            self.bindings.remove(&(name.to_string(), port_idx));
            return self.recompute_order();
        }

        let stream = self
            .streams
            .get(path)
            .ok_or_else(|| TalonError::UnknownStream(path.to_string()))?
            .clone();
        if stream.stream_type() != port.stream_type {
            return Err(TalonError::TypeMismatch {
                stream: path.to_string(),
                expected: port.stream_type.to_string(),
                got: stream.stream_type().to_string(),
            });
        }
        if stream.rate_hz() != port.rate_hz {
            return Err(TalonError::RateMismatch {
                stream: path.to_string(),
                expected: port.rate_hz,
                got: stream.rate_hz(),
            });
        }

        // bind tentatively; a cycle reverts to the previous wiring
        let key = (name.to_string(), port_idx);
        let previous = self.bindings.insert(key.clone(), path.to_string());
        if let Err(err) = self.recompute_order() {
            match previous {
                Some(prev) => self.bindings.insert(key, prev),
                None => self.bindings.remove(&key),
            };
            self.recompute_order()?;
            return Err(err);
        }

        self.entries[idx].node.bind_input(port_idx, Some(&stream))
    }

    /// Apply a config to a node; failure leaves the previous config in place
    pub fn set_config(&mut self, name: &str, config: &NodeConfig) -> TalonResult<()> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| TalonError::node(name, "not found"))?;
        self.entries[idx].node.apply_config(config)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn node(&self, name: &str) -> Option<&dyn Node> {
        self.by_name
            .get(name)
            .map(|&idx| self.entries[idx].node.as_ref())
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut dyn Node> {
        match self.by_name.get(name) {
            Some(&idx) => Some(self.entries[idx].node.as_mut()),
            None => None,
        }
    }

    pub fn node_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.node.name().to_string())
            .collect()
    }

    pub fn stream(&self, id: &str) -> Option<&StreamHandle> {
        self.streams.get(id)
    }

    pub fn stream_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.streams.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The bound stream path of a port, if any
    pub fn binding(&self, name: &str, port_idx: usize) -> Option<&str> {
        self.bindings
            .get(&(name.to_string(), port_idx))
            .map(String::as_str)
    }

    pub fn plant(&self) -> Option<&str> {
        self.plant.as_deref()
    }

    /// Node names in execution order
    pub fn execution_order(&self) -> Vec<String> {
        self.order
            .iter()
            .map(|&idx| self.entries[idx].node.name().to_string())
            .collect()
    }

    /// Full wiring check: every binding resolves, matches its port and the
    /// digraph stays acyclic
    pub fn validate(&self) -> TalonResult<()> {
        for ((consumer, port_idx), path) in &self.bindings {
            let idx = self
                .by_name
                .get(consumer)
                .ok_or_else(|| TalonError::node(consumer.clone(), "not found"))?;
            let ports = self.entries[*idx].node.inputs();
            let port = ports.get(*port_idx).ok_or_else(|| {
                TalonError::invalid_input(format!("port {} gone on '{}'", port_idx, consumer))
            })?;
            let stream = self
                .streams
                .get(path)
                .ok_or_else(|| TalonError::UnknownStream(path.clone()))?;
            let producer = path.split('/').next().unwrap_or_default();
            if !self.by_name.contains_key(producer) {
                return Err(TalonError::UnknownStream(path.clone()));
            }
            if stream.stream_type() != port.stream_type {
                return Err(TalonError::TypeMismatch {
                    stream: path.clone(),
                    expected: port.stream_type.to_string(),
                    got: stream.stream_type().to_string(),
                });
            }
            if stream.rate_hz() != port.rate_hz {
                return Err(TalonError::RateMismatch {
                    stream: path.clone(),
                    expected: port.rate_hz,
                    got: stream.rate_hz(),
                });
            }
        }
        // order is kept fresh by every mutation; recheck anyway
        self.toposort().map(|_| ())
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Called by the scheduler once before the first tick
    pub fn start_all(&mut self, origin_us: u64) {
        for entry in &mut self.entries {
            entry.node.start(origin_us);
        }
    }

    /// Run one tick over all nodes in execution order
    ///
    /// The only error out of here is fatal: the execution order no longer
    /// covers the node set, which means the topology was corrupted mid-tick.
    pub fn process_tick(&mut self, ctx: &TickCtx) -> TalonResult<()> {
        if self.order.len() != self.entries.len() {
            return Err(TalonError::SchedulerInvariant(format!(
                "execution order covers {} of {} nodes",
                self.order.len(),
                self.entries.len()
            )));
        }
        let order = self.order.clone();
        for idx in order {
            self.entries[idx].node.process(ctx);
        }
        Ok(())
    }

    /// Drop all nodes in reverse init order
    pub fn teardown(&mut self) {
        self.bindings.clear();
        self.streams.clear();
        self.by_name.clear();
        self.order.clear();
        self.plant = None;
        while let Some(entry) = self.entries.pop() {
            debug!(node = %entry.node.name(), "node torn down");
            drop(entry);
        }
    }

    // ------------------------------------------------------------------

    fn reindex(&mut self) {
        self.by_name = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.node.name().to_string(), idx))
            .collect();
    }

    fn recompute_order(&mut self) -> TalonResult<()> {
        self.order = self.toposort()?;
        Ok(())
    }

    /// Kahn's algorithm over binding edges, init order as the tie-breaker
    fn toposort(&self) -> TalonResult<Vec<usize>> {
        let n = self.entries.len();
        let plant_idx = self.plant.as_ref().and_then(|p| self.by_name.get(p)).copied();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];

        for ((consumer, _), path) in &self.bindings {
            let Some(&cidx) = self.by_name.get(consumer) else {
                continue;
            };
            let producer = path.split('/').next().unwrap_or_default();
            let Some(&pidx) = self.by_name.get(producer) else {
                continue;
            };
            if pidx == cidx {
                return Err(TalonError::CycleDetected(consumer.clone()));
            }
            let (from, to) = if Some(pidx) == plant_idx {
                // delayed edge: the consumer reads last tick's buffer, so it
                // must run before the plant refills it
                (cidx, pidx)
            } else {
                (pidx, cidx)
            };
            successors[from].push(to);
            indegree[to] += 1;
        }

        let mut order = Vec::with_capacity(n);
        let mut done = vec![false; n];
        loop {
            // lowest init index among the ready nodes keeps runs deterministic
            let next = (0..n).find(|&i| !done[i] && indegree[i] == 0);
            let Some(i) = next else { break };
            done[i] = true;
            order.push(i);
            for &succ in &successors[i] {
                indegree[succ] -= 1;
            }
        }

        if order.len() != n {
            let stuck = (0..n)
                .find(|&i| !done[i])
                .map(|i| self.entries[i].node.name().to_string())
                .unwrap_or_default();
            return Err(TalonError::CycleDetected(stuck));
        }
        Ok(order)
    }
}
