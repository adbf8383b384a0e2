//! The fixed-tick graph scheduler

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::TalonResult;
use crate::graph::{Graph, TickCtx};

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed tick period; total per-tick work must fit inside it
    pub tick_period: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(1),
        }
    }
}

impl SchedulerConfig {
    pub fn with_tick_period(tick_period: Duration) -> Self {
        Self { tick_period }
    }
}

/// Single-threaded cooperative fixed-tick driver
///
/// Each tick snapshots a timestamp T and invokes `process` on every node in
/// the graph's execution order; predecessor writes happen-before successor
/// reads because nothing else runs. There are no suspension points inside a
/// tick and no per-operation cancellation: shutdown sets a stop flag, the
/// current tick drains, and nodes are torn down in reverse init order.
///
/// Tick timestamps are virtual monotonic microseconds advancing by exactly
/// one period per tick; `run`/`run_for` pace them against the wall clock.
/// Deterministic sample pacing matters here, wall-clock alignment does not.
pub struct Scheduler {
    graph: Graph,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    tick: u64,
    now_us: u64,
    started: bool,
}

impl Scheduler {
    pub fn new(graph: Graph) -> Self {
        Self::with_config(graph, SchedulerConfig::default())
    }

    pub fn with_config(graph: Graph, config: SchedulerConfig) -> Self {
        Self {
            graph,
            config,
            running: Arc::new(AtomicBool::new(false)),
            tick: 0,
            now_us: 0,
            started: false,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Ticks completed so far
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Current virtual time in microseconds
    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    /// A flag that stops `run`/`run_for` after the current tick
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Execute exactly one tick
    ///
    /// The first call validates the wiring and delivers `start` to every
    /// node with the tick origin.
    pub fn step(&mut self) -> TalonResult<()> {
        if !self.started {
            self.graph.validate()?;
            self.graph.start_all(self.now_us);
            self.started = true;
            info!(
                nodes = self.graph.node_names().len(),
                period_us = self.config.tick_period.as_micros() as u64,
                "scheduler started"
            );
        }
        let dt_us = self.config.tick_period.as_micros() as u64;
        self.now_us += dt_us;
        let ctx = TickCtx {
            tick: self.tick,
            now_us: self.now_us,
            dt_us,
        };
        self.graph.process_tick(&ctx)?;
        self.tick += 1;
        Ok(())
    }

    /// Run ticks until the stop flag clears
    pub fn run(&mut self) -> TalonResult<()> {
        self.running.store(true, Ordering::SeqCst);
        let period = self.config.tick_period;
        let mut next = Instant::now() + period;
        while self.running.load(Ordering::SeqCst) {
            self.step()?;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else if now - next > period * 10 {
                warn!("scheduler fell behind by {:?}", now - next);
                next = now;
            }
            next += period;
        }
        self.shutdown();
        Ok(())
    }

    /// Run for a wall-clock duration, then shut down gracefully
    pub fn run_for(&mut self, duration: Duration) -> TalonResult<()> {
        let ticks = (duration.as_micros() / self.config.tick_period.as_micros()).max(1) as u64;
        self.running.store(true, Ordering::SeqCst);
        let period = self.config.tick_period;
        let mut next = Instant::now() + period;
        for _ in 0..ticks {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.step()?;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            }
            next += period;
        }
        self.shutdown();
        Ok(())
    }

    /// Run a fixed number of ticks without wall-clock pacing, then shut down
    pub fn run_ticks(&mut self, ticks: u64) -> TalonResult<()> {
        self.running.store(true, Ordering::SeqCst);
        for _ in 0..ticks {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.step()?;
        }
        self.shutdown();
        Ok(())
    }

    /// Cooperative teardown: reverse init order, releasing node resources
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        info!(ticks = self.tick, "scheduler stopped");
        self.graph.teardown();
        self.started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TalonResult;
    use crate::graph::{
        GeneratorDescriptor, Node, NodeClass, NodeConfig, NodeDescriptor, OutputSpec, PortSpec,
        ScalarGeneratorConfig,
    };
    use crate::stream::{Scalar, Stream, StreamHandle, StreamReader, StreamType};
    use std::cell::RefCell;
    use std::rc::Rc;

    // A source that emits one sample per tick and a sink that records what it
    // saw, to pin down same-tick delivery and execution order.

    struct TestSource {
        name: String,
        out: Rc<Stream<Scalar>>,
    }

    impl TestSource {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                out: Stream::new(format!("{}/out", name), 100).unwrap(),
            }
        }
    }

    impl Node for TestSource {
        fn kind(&self) -> &'static str {
            "test_source"
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn class(&self) -> NodeClass {
            NodeClass::Source
        }
        fn init(&mut self, _d: &NodeDescriptor) -> TalonResult<()> {
            Ok(())
        }
        fn descriptor(&self) -> NodeDescriptor {
            NodeDescriptor::ScalarGenerator(GeneratorDescriptor { rate_hz: 100 })
        }
        fn apply_config(&mut self, _c: &NodeConfig) -> TalonResult<()> {
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
        fn process(&mut self, ctx: &crate::graph::TickCtx) {
            self.out.clear();
            self.out.push(Scalar(ctx.tick as f32), ctx.now_us);
        }
    }

    struct TestSink {
        name: String,
        reader: StreamReader<Scalar>,
        seen: Rc<RefCell<Vec<f32>>>,
    }

    impl Node for TestSink {
        fn kind(&self) -> &'static str {
            "test_sink"
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn class(&self) -> NodeClass {
            NodeClass::Sink
        }
        fn init(&mut self, _d: &NodeDescriptor) -> TalonResult<()> {
            Ok(())
        }
        fn descriptor(&self) -> NodeDescriptor {
            NodeDescriptor::ScalarGenerator(GeneratorDescriptor { rate_hz: 100 })
        }
        fn apply_config(&mut self, _c: &NodeConfig) -> TalonResult<()> {
            Ok(())
        }
        fn config(&self) -> NodeConfig {
            NodeConfig::ScalarGenerator(ScalarGeneratorConfig::default())
        }
        fn inputs(&self) -> Vec<PortSpec> {
            vec![PortSpec {
                name: "in".into(),
                stream_type: StreamType::Scalar,
                rate_hz: 100,
            }]
        }
        fn bind_input(
            &mut self,
            _port_idx: usize,
            stream: Option<&StreamHandle>,
        ) -> TalonResult<()> {
            self.reader = match stream {
                Some(handle) => StreamReader::bind(handle)?,
                None => StreamReader::unbound(),
            };
            Ok(())
        }
        fn process(&mut self, _ctx: &crate::graph::TickCtx) {
            if let Some(samples) = self.reader.samples() {
                self.seen
                    .borrow_mut()
                    .extend(samples.iter().map(|s| s.value.0));
            }
        }
    }

    fn wired_graph(seen: Rc<RefCell<Vec<f32>>>) -> Graph {
        let mut graph = Graph::new();
        // sink first on purpose: topo order must still run the source first
        graph
            .insert_node(Box::new(TestSink {
                name: "sink".into(),
                reader: StreamReader::unbound(),
                seen,
            }))
            .unwrap();
        graph.insert_node(Box::new(TestSource::new("src"))).unwrap();
        graph.set_input_path("sink", 0, "src/out").unwrap();
        graph
    }

    #[test]
    fn test_same_tick_delivery_in_topo_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sched = Scheduler::new(wired_graph(seen.clone()));
        assert_eq!(
            sched.graph().execution_order(),
            vec!["src".to_string(), "sink".to_string()]
        );
        for _ in 0..3 {
            sched.step().unwrap();
        }
        // every sample produced on tick N is consumed on tick N
        assert_eq!(*seen.borrow(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_virtual_time_advances_by_period() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let config = SchedulerConfig::with_tick_period(Duration::from_millis(10));
        let mut sched = Scheduler::with_config(wired_graph(seen), config);
        sched.step().unwrap();
        sched.step().unwrap();
        assert_eq!(sched.now_us(), 20_000);
        assert_eq!(sched.tick_count(), 2);
    }

    #[test]
    fn test_run_ticks_tears_down() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sched = Scheduler::new(wired_graph(seen.clone()));
        sched.run_ticks(5).unwrap();
        assert_eq!(seen.borrow().len(), 5);
        assert!(sched.graph().node_names().is_empty());
    }
}
