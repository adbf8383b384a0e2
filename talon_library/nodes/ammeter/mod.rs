//! ADC ammeter
//!
//! Scales a raw ADC stream into a current stream at the same rate. The scale
//! and bias come from the shunt/sensor calibration and may be retuned at
//! runtime.

use std::rc::Rc;

use tracing::warn;

use talon_core::error::{TalonError, TalonResult};
use talon_core::graph::{
    AmmeterConfig, AmmeterDescriptor, Node, NodeClass, NodeConfig, NodeDescriptor, OutputSpec,
    PortSpec, TickCtx,
};
use talon_core::stream::{Adc, Current, Stream, StreamHandle, StreamReader, StreamType};

pub struct AmmeterNode {
    name: String,
    rate_hz: u32,
    config: AmmeterConfig,
    input: StreamReader<Adc>,
    output: Option<Rc<Stream<Current>>>,
}

impl AmmeterNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rate_hz: 0,
            config: AmmeterConfig::default(),
            input: StreamReader::unbound(),
            output: None,
        }
    }
}

impl Node for AmmeterNode {
    fn kind(&self) -> &'static str {
        "ammeter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> NodeClass {
        NodeClass::Processor
    }

    fn init(&mut self, descriptor: &NodeDescriptor) -> TalonResult<()> {
        let NodeDescriptor::Ammeter(desc) = descriptor else {
            return Err(TalonError::kind_mismatch(
                "ammeter descriptor",
                descriptor.kind(),
            ));
        };
        if desc.rate_hz == 0 {
            return Err(TalonError::config("bad rate: 0Hz"));
        }
        self.rate_hz = desc.rate_hz;
        self.output = Some(Stream::new(format!("{}/current", self.name), desc.rate_hz)?);
        Ok(())
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::Ammeter(AmmeterDescriptor {
            rate_hz: self.rate_hz,
        })
    }

    fn apply_config(&mut self, config: &NodeConfig) -> TalonResult<()> {
        let NodeConfig::Ammeter(config) = config else {
            return Err(TalonError::kind_mismatch("ammeter config", config.kind()));
        };
        self.config = config.clone();
        Ok(())
    }

    fn config(&self) -> NodeConfig {
        NodeConfig::Ammeter(self.config.clone())
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec {
            name: "adc".into(),
            stream_type: StreamType::Adc,
            rate_hz: self.rate_hz,
        }]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        match &self.output {
            Some(stream) => vec![OutputSpec {
                name: "current".into(),
                stream: stream.clone(),
            }],
            None => Vec::new(),
        }
    }

    fn bind_input(&mut self, port_idx: usize, stream: Option<&StreamHandle>) -> TalonResult<()> {
        if port_idx != 0 {
            return Err(TalonError::invalid_input("no such port"));
        }
        self.input = match stream {
            Some(handle) => StreamReader::bind(handle)?,
            None => StreamReader::unbound(),
        };
        Ok(())
    }

    fn process(&mut self, _ctx: &TickCtx) {
        let Some(output) = &self.output else {
            warn!(node = %self.name, "process before init");
            return;
        };
        output.clear();
        let Some(samples) = self.input.samples() else {
            return;
        };
        for sample in samples {
            let current = sample.value.0 * self.config.scale + self.config.bias;
            output.push_with_health(Current(current), sample.timestamp_us, sample.is_healthy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scales_adc_to_current() {
        let mut node = AmmeterNode::new("amp");
        node.init(&NodeDescriptor::Ammeter(AmmeterDescriptor { rate_hz: 100 }))
            .unwrap();
        node.apply_config(&NodeConfig::Ammeter(AmmeterConfig {
            scale: 40.0,
            bias: -0.5,
        }))
        .unwrap();

        let adc = Stream::<Adc>::new("adc/out", 100).unwrap();
        let handle: StreamHandle = adc.clone();
        node.bind_input(0, Some(&handle)).unwrap();

        adc.push(Adc(0.5), 10_000);
        adc.push_with_health(Adc(0.25), 20_000, false);
        node.process(&TickCtx {
            tick: 0,
            now_us: 20_000,
            dt_us: 20_000,
        });

        let output = node.output.as_ref().unwrap();
        let samples = output.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, Current(19.5));
        assert!(samples[0].is_healthy);
        // health rides along with the source sample
        assert_eq!(samples[1].value, Current(9.5));
        assert!(!samples[1].is_healthy);
    }

    #[test]
    fn test_unbound_input_produces_nothing() {
        let mut node = AmmeterNode::new("amp");
        node.init(&NodeDescriptor::Ammeter(AmmeterDescriptor { rate_hz: 100 }))
            .unwrap();
        node.process(&TickCtx {
            tick: 0,
            now_us: 10_000,
            dt_us: 10_000,
        });
        assert_eq!(node.output.as_ref().unwrap().len(), 0);
    }
}
