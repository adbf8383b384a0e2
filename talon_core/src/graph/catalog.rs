//! Node kind catalog

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{TalonError, TalonResult};
use crate::graph::node::{Node, NodeClass};
use crate::graph::params::NodeDescriptor;

/// A kind the catalog can instantiate, as advertised to remotes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub kind: String,
    pub class: NodeClass,
    /// A descriptor that instantiates a working default node
    pub default_descriptor: NodeDescriptor,
}

type Factory = Box<dyn Fn(&str) -> Box<dyn Node>>;

/// Maps kind names to node factories
///
/// A factory receives the instance name (streams are allocated later, at
/// `init`, as `"<name>/<output>"`) and returns an uninitialized node.
#[derive(Default)]
pub struct NodeCatalog {
    defs: Vec<NodeDef>,
    factories: HashMap<String, Factory>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind; later registrations of the same kind replace earlier
    /// ones
    pub fn register<F>(&mut self, def: NodeDef, factory: F)
    where
        F: Fn(&str) -> Box<dyn Node> + 'static,
    {
        self.defs.retain(|d| d.kind != def.kind);
        self.factories.insert(def.kind.clone(), Box::new(factory));
        self.defs.push(def);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Instantiate an uninitialized node of the given kind
    pub fn create(&self, kind: &str, name: &str) -> TalonResult<Box<dyn Node>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| TalonError::UnknownNodeKind(kind.to_string()))?;
        Ok(factory(name))
    }

    /// Advertised kinds, in registration order
    pub fn defs(&self) -> &[NodeDef] {
        &self.defs
    }
}
