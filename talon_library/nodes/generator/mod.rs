//! Generator nodes
//!
//! Parameterized sources producing a configurable constant at a fixed rate.
//! The scalar generator additionally accepts an optional same-rate modulation
//! input that is added onto the configured value; the vector generators feed
//! force/torque targets to the mixer in tests and bench setups.

use std::rc::Rc;

use nalgebra::Vector3;
use tracing::warn;

use talon_core::error::{TalonError, TalonResult};
use talon_core::graph::{
    GeneratorDescriptor, Node, NodeClass, NodeConfig, NodeDescriptor, OutputSpec, PortSpec,
    ScalarGeneratorConfig, TickCtx, VectorGeneratorConfig,
};
use talon_core::stream::{
    Force, Pacer, Scalar, Stream, StreamHandle, StreamReader, StreamType, Torque,
};

/// Scalar constant source with an optional modulation input
pub struct ScalarGeneratorNode {
    name: String,
    rate_hz: u32,
    config: ScalarGeneratorConfig,
    output: Option<Rc<Stream<Scalar>>>,
    modulation: StreamReader<Scalar>,
    pacer: Pacer,
}

impl ScalarGeneratorNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rate_hz: 0,
            config: ScalarGeneratorConfig::default(),
            output: None,
            modulation: StreamReader::unbound(),
            pacer: Pacer::new(1),
        }
    }
}

impl Node for ScalarGeneratorNode {
    fn kind(&self) -> &'static str {
        "scalar_generator"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> NodeClass {
        NodeClass::Generator
    }

    fn init(&mut self, descriptor: &NodeDescriptor) -> TalonResult<()> {
        let NodeDescriptor::ScalarGenerator(desc) = descriptor else {
            return Err(TalonError::kind_mismatch(
                "scalar_generator descriptor",
                descriptor.kind(),
            ));
        };
        if desc.rate_hz == 0 {
            return Err(TalonError::config("bad rate: 0Hz"));
        }
        self.rate_hz = desc.rate_hz;
        self.pacer = Pacer::new(desc.rate_hz);
        self.output = Some(Stream::new(format!("{}/out", self.name), desc.rate_hz)?);
        Ok(())
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::ScalarGenerator(GeneratorDescriptor {
            rate_hz: self.rate_hz,
        })
    }

    fn apply_config(&mut self, config: &NodeConfig) -> TalonResult<()> {
        let NodeConfig::ScalarGenerator(config) = config else {
            return Err(TalonError::kind_mismatch(
                "scalar_generator config",
                config.kind(),
            ));
        };
        self.config = config.clone();
        Ok(())
    }

    fn config(&self) -> NodeConfig {
        NodeConfig::ScalarGenerator(self.config.clone())
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec {
            name: "modulation".into(),
            stream_type: StreamType::Scalar,
            rate_hz: self.rate_hz,
        }]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        match &self.output {
            Some(stream) => vec![OutputSpec {
                name: "out".into(),
                stream: stream.clone(),
            }],
            None => Vec::new(),
        }
    }

    fn bind_input(&mut self, port_idx: usize, stream: Option<&StreamHandle>) -> TalonResult<()> {
        if port_idx != 0 {
            return Err(TalonError::invalid_input("no such port"));
        }
        self.modulation = match stream {
            Some(handle) => StreamReader::bind(handle)?,
            None => StreamReader::unbound(),
        };
        Ok(())
    }

    fn start(&mut self, origin_us: u64) {
        self.pacer.start(origin_us);
    }

    fn process(&mut self, ctx: &TickCtx) {
        let Some(output) = &self.output else {
            warn!(node = %self.name, "process before init");
            return;
        };
        output.clear();
        match self.modulation.samples() {
            // modulated: one output sample per modulation sample
            Some(samples) => {
                for s in samples {
                    output.push_with_health(
                        Scalar(self.config.value + s.value.0),
                        s.timestamp_us,
                        s.is_healthy,
                    );
                }
            }
            // free-running: paced by our own rate
            None => {
                for ts in self.pacer.timestamps_until(ctx.now_us) {
                    output.push(Scalar(self.config.value), ts);
                }
            }
        }
    }
}

macro_rules! vector_generator {
    ($node:ident, $value:ident, $kind:literal, $variant:ident, $doc:literal) => {
        #[doc = $doc]
        pub struct $node {
            name: String,
            rate_hz: u32,
            config: VectorGeneratorConfig,
            output: Option<Rc<Stream<$value>>>,
            pacer: Pacer,
        }

        impl $node {
            pub fn new(name: &str) -> Self {
                Self {
                    name: name.to_string(),
                    rate_hz: 0,
                    config: VectorGeneratorConfig::default(),
                    output: None,
                    pacer: Pacer::new(1),
                }
            }

            /// Current target vector
            pub fn value(&self) -> Vector3<f32> {
                self.config.value
            }
        }

        impl Node for $node {
            fn kind(&self) -> &'static str {
                $kind
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn class(&self) -> NodeClass {
                NodeClass::Generator
            }

            fn init(&mut self, descriptor: &NodeDescriptor) -> TalonResult<()> {
                let NodeDescriptor::$variant(desc) = descriptor else {
                    return Err(TalonError::kind_mismatch(
                        concat!($kind, " descriptor"),
                        descriptor.kind(),
                    ));
                };
                if desc.rate_hz == 0 {
                    return Err(TalonError::config("bad rate: 0Hz"));
                }
                self.rate_hz = desc.rate_hz;
                self.pacer = Pacer::new(desc.rate_hz);
                self.output = Some(Stream::new(format!("{}/out", self.name), desc.rate_hz)?);
                Ok(())
            }

            fn descriptor(&self) -> NodeDescriptor {
                NodeDescriptor::$variant(GeneratorDescriptor {
                    rate_hz: self.rate_hz,
                })
            }

            fn apply_config(&mut self, config: &NodeConfig) -> TalonResult<()> {
                let NodeConfig::$variant(config) = config else {
                    return Err(TalonError::kind_mismatch(
                        concat!($kind, " config"),
                        config.kind(),
                    ));
                };
                self.config = config.clone();
                Ok(())
            }

            fn config(&self) -> NodeConfig {
                NodeConfig::$variant(self.config.clone())
            }

            fn outputs(&self) -> Vec<OutputSpec> {
                match &self.output {
                    Some(stream) => vec![OutputSpec {
                        name: "out".into(),
                        stream: stream.clone(),
                    }],
                    None => Vec::new(),
                }
            }

            fn start(&mut self, origin_us: u64) {
                self.pacer.start(origin_us);
            }

            fn process(&mut self, ctx: &TickCtx) {
                let Some(output) = &self.output else {
                    warn!(node = %self.name, "process before init");
                    return;
                };
                output.clear();
                for ts in self.pacer.timestamps_until(ctx.now_us) {
                    output.push($value(self.config.value), ts);
                }
            }
        }
    };
}

vector_generator!(
    ForceGeneratorNode,
    Force,
    "force_generator",
    ForceGenerator,
    "Constant collective-force target source"
);
vector_generator!(
    TorqueGeneratorNode,
    Torque,
    "torque_generator",
    TorqueGenerator,
    "Constant body-torque target source"
);

#[cfg(test)]
mod tests {
    use super::*;

    fn ticked(node: &mut dyn Node, tick: u64, now_us: u64) {
        node.process(&TickCtx {
            tick,
            now_us,
            dt_us: 10_000,
        });
    }

    #[test]
    fn test_free_running_pacing() {
        let mut gen = ScalarGeneratorNode::new("gen");
        gen.init(&NodeDescriptor::ScalarGenerator(GeneratorDescriptor {
            rate_hz: 100,
        }))
        .unwrap();
        gen.apply_config(&NodeConfig::ScalarGenerator(ScalarGeneratorConfig {
            value: 2.5,
        }))
        .unwrap();
        gen.start(0);

        // 35ms of progress at 100Hz: 3 samples, the remainder carries over
        ticked(&mut gen, 0, 35_000);
        let out = gen.output.clone().unwrap();
        {
            let samples = out.samples();
            assert_eq!(samples.len(), 3);
            assert!(samples.iter().all(|s| s.value == Scalar(2.5)));
            assert_eq!(samples[2].timestamp_us, 30_000);
        }

        ticked(&mut gen, 1, 40_000);
        let samples = out.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].sample_idx, 3);
    }

    #[test]
    fn test_modulation_overrides_pacing() {
        let mut gen = ScalarGeneratorNode::new("gen");
        gen.init(&NodeDescriptor::ScalarGenerator(GeneratorDescriptor {
            rate_hz: 100,
        }))
        .unwrap();
        gen.apply_config(&NodeConfig::ScalarGenerator(ScalarGeneratorConfig {
            value: 1.0,
        }))
        .unwrap();

        let modulation = Stream::<Scalar>::new("mod/out", 100).unwrap();
        let handle: StreamHandle = modulation.clone();
        gen.bind_input(0, Some(&handle)).unwrap();
        gen.start(0);

        modulation.push(Scalar(0.25), 10_000);
        modulation.push_with_health(Scalar(-0.5), 20_000, false);

        ticked(&mut gen, 0, 20_000);
        let out = gen.output.as_ref().unwrap();
        let samples = out.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, Scalar(1.25));
        assert_eq!(samples[1].value, Scalar(0.5));
        // modulation health propagates
        assert!(!samples[1].is_healthy);
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut gen = ForceGeneratorNode::new("force");
        let err = gen
            .init(&NodeDescriptor::ForceGenerator(GeneratorDescriptor {
                rate_hz: 0,
            }))
            .unwrap_err();
        assert!(matches!(err, TalonError::Config(_)));
    }

    #[test]
    fn test_vector_generator_output() {
        let mut gen = TorqueGeneratorNode::new("torque");
        gen.init(&NodeDescriptor::TorqueGenerator(GeneratorDescriptor {
            rate_hz: 50,
        }))
        .unwrap();
        gen.apply_config(&NodeConfig::TorqueGenerator(VectorGeneratorConfig {
            value: Vector3::new(0.0, 0.0, 0.3),
        }))
        .unwrap();
        gen.start(0);
        ticked(&mut gen, 0, 20_000);
        let out = gen.output.as_ref().unwrap();
        let samples = out.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, Torque(Vector3::new(0.0, 0.0, 0.3)));
    }
}
