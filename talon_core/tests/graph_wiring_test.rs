// Graph wiring rules: binding validation, cycle handling, plant ordering
use std::rc::Rc;

use talon_core::error::{TalonError, TalonResult};
use talon_core::graph::{
    GeneratorDescriptor, Graph, Node, NodeClass, NodeConfig, NodeDescriptor, OutputSpec, PortSpec,
    ScalarGeneratorConfig, TickCtx,
};
use talon_core::stream::{Scalar, Stream, StreamHandle, StreamReader, StreamType, Throttle};

/// Minimal node with one optional scalar input and one scalar output
struct Relay {
    name: String,
    class: NodeClass,
    rate_hz: u32,
    out: Rc<Stream<Scalar>>,
    reader: StreamReader<Scalar>,
}

impl Relay {
    fn new(name: &str, class: NodeClass, rate_hz: u32) -> Self {
        Self {
            name: name.to_string(),
            class,
            rate_hz,
            out: Stream::new(format!("{}/out", name), rate_hz).unwrap(),
            reader: StreamReader::unbound(),
        }
    }
}

impl Node for Relay {
    fn kind(&self) -> &'static str {
        "relay"
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn class(&self) -> NodeClass {
        self.class
    }
    fn init(&mut self, _descriptor: &NodeDescriptor) -> TalonResult<()> {
        Ok(())
    }
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::ScalarGenerator(GeneratorDescriptor {
            rate_hz: self.rate_hz,
        })
    }
    fn apply_config(&mut self, _config: &NodeConfig) -> TalonResult<()> {
        Ok(())
    }
    fn config(&self) -> NodeConfig {
        NodeConfig::ScalarGenerator(ScalarGeneratorConfig::default())
    }
    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec {
            name: "in".into(),
            stream_type: StreamType::Scalar,
            rate_hz: self.rate_hz,
        }]
    }
    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec {
            name: "out".into(),
            stream: self.out.clone(),
        }]
    }
    fn bind_input(&mut self, _port_idx: usize, stream: Option<&StreamHandle>) -> TalonResult<()> {
        self.reader = match stream {
            Some(handle) => StreamReader::bind(handle)?,
            None => StreamReader::unbound(),
        };
        Ok(())
    }
    fn process(&mut self, ctx: &TickCtx) {
        self.out.clear();
        let value = self
            .reader
            .latest()
            .map(|s| s.value.0 + 1.0)
            .unwrap_or_default();
        self.out.push(Scalar(value), ctx.now_us);
    }
}

/// A source publishing throttle, to provoke type mismatches
struct ThrottleSource {
    name: String,
    out: Rc<Stream<Throttle>>,
}

impl ThrottleSource {
    fn new(name: &str, rate_hz: u32) -> Self {
        Self {
            name: name.to_string(),
            out: Stream::new(format!("{}/out", name), rate_hz).unwrap(),
        }
    }
}

impl Node for ThrottleSource {
    fn kind(&self) -> &'static str {
        "throttle_source"
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn class(&self) -> NodeClass {
        NodeClass::Source
    }
    fn init(&mut self, _descriptor: &NodeDescriptor) -> TalonResult<()> {
        Ok(())
    }
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::ScalarGenerator(GeneratorDescriptor { rate_hz: 100 })
    }
    fn apply_config(&mut self, _config: &NodeConfig) -> TalonResult<()> {
        Ok(())
    }
    fn config(&self) -> NodeConfig {
        NodeConfig::ScalarGenerator(ScalarGeneratorConfig::default())
    }
    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec {
            name: "out".into(),
            stream: self.out.clone(),
        }]
    }
    fn process(&mut self, ctx: &TickCtx) {
        self.out.clear();
        self.out.push(Throttle(0.0), ctx.now_us);
    }
}

fn relay(graph: &mut Graph, name: &str, rate_hz: u32) {
    graph
        .insert_node(Box::new(Relay::new(name, NodeClass::Processor, rate_hz)))
        .unwrap();
}

#[test]
fn test_duplicate_node_name_rejected() {
    let mut graph = Graph::new();
    relay(&mut graph, "a", 100);
    let err = graph
        .insert_node(Box::new(Relay::new("a", NodeClass::Processor, 100)))
        .unwrap_err();
    assert!(matches!(err, TalonError::DuplicateNodeName(n) if n == "a"));
}

#[test]
fn test_unknown_stream_rejected() {
    let mut graph = Graph::new();
    relay(&mut graph, "a", 100);
    let err = graph.set_input_path("a", 0, "ghost/out").unwrap_err();
    assert!(matches!(err, TalonError::UnknownStream(_)));
}

#[test]
fn test_type_mismatch_rejected() {
    let mut graph = Graph::new();
    relay(&mut graph, "a", 100);
    graph
        .insert_node(Box::new(ThrottleSource::new("thr", 100)))
        .unwrap();
    let err = graph.set_input_path("a", 0, "thr/out").unwrap_err();
    assert!(matches!(err, TalonError::TypeMismatch { .. }));
    assert!(graph.binding("a", 0).is_none());
}

#[test]
fn test_rate_mismatch_rejected() {
    let mut graph = Graph::new();
    relay(&mut graph, "fast", 200);
    relay(&mut graph, "slow", 100);
    let err = graph.set_input_path("fast", 0, "slow/out").unwrap_err();
    assert!(matches!(
        err,
        TalonError::RateMismatch {
            expected: 200,
            got: 100,
            ..
        }
    ));
}

#[test]
fn test_cycle_detected_and_reverted() {
    let mut graph = Graph::new();
    relay(&mut graph, "a", 100);
    relay(&mut graph, "b", 100);
    graph.set_input_path("b", 0, "a/out").unwrap();

    let err = graph.set_input_path("a", 0, "b/out").unwrap_err();
    assert!(matches!(err, TalonError::CycleDetected(_)));
    // the failed bind left the previous wiring intact
    assert!(graph.binding("a", 0).is_none());
    assert_eq!(graph.binding("b", 0), Some("a/out"));
    assert!(graph.validate().is_ok());
}

#[test]
fn test_plant_breaks_cycle_and_orders_last() {
    let mut graph = Graph::new();
    // controller -> plant -> controller feedback loop
    graph
        .insert_node(Box::new(Relay::new("plant", NodeClass::Simulator, 100)))
        .unwrap();
    relay(&mut graph, "controller", 100);

    // the controller reads the plant's sensor stream...
    graph.set_input_path("controller", 0, "plant/out").unwrap();
    // ...and the plant consumes the controller's output: legal, one-tick delay
    graph.set_input_path("plant", 0, "controller/out").unwrap();

    // plant consumers run before the plant refills its buffers
    assert_eq!(
        graph.execution_order(),
        vec!["controller".to_string(), "plant".to_string()]
    );
    assert!(graph.validate().is_ok());
}

#[test]
fn test_second_plant_rejected() {
    let mut graph = Graph::new();
    graph
        .insert_node(Box::new(Relay::new("plant", NodeClass::Simulator, 100)))
        .unwrap();
    let err = graph
        .insert_node(Box::new(Relay::new("plant2", NodeClass::Simulator, 100)))
        .unwrap_err();
    assert!(matches!(err, TalonError::InvalidInput(_)));
}

#[test]
fn test_remove_node_unbinds_consumers() {
    let mut graph = Graph::new();
    relay(&mut graph, "a", 100);
    relay(&mut graph, "b", 100);
    graph.set_input_path("b", 0, "a/out").unwrap();

    graph.remove_node("a").unwrap();
    assert!(graph.binding("b", 0).is_none());
    assert!(graph.stream("a/out").is_none());
    assert_eq!(graph.node_names(), vec!["b".to_string()]);

    // the freed name can be reused
    relay(&mut graph, "a", 100);
    assert!(graph.set_input_path("b", 0, "a/out").is_ok());
}
