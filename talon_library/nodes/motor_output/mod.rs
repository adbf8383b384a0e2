//! Motor output sink
//!
//! Converts per-motor throttle streams into PWM pulse widths and writes them
//! to an ESC bank over a bus handle, one register per channel. Channels idle
//! at the minimum pulse until a sample arrives and whenever the mixer stops
//! producing, so a degraded upstream never leaves motors at speed.

use tracing::warn;

use talon_core::bus::BusHandle;
use talon_core::error::{TalonError, TalonResult};
use talon_core::graph::{
    MotorOutputConfig, MotorOutputDescriptor, Node, NodeClass, NodeConfig, NodeDescriptor,
    NodeStats, PortSpec, TickCtx,
};
use talon_core::stream::{StreamHandle, StreamReader, StreamType, Throttle};

pub struct MotorOutputNode {
    name: String,
    bus: BusHandle,
    channels: u32,
    rate_hz: u32,
    config: MotorOutputConfig,
    readers: Vec<StreamReader<Throttle>>,
    /// Last commanded pulse per channel, µs
    pulses: Vec<u16>,
    stats: NodeStats,
}

impl MotorOutputNode {
    pub fn new(name: &str, bus: BusHandle) -> Self {
        Self {
            name: name.to_string(),
            bus,
            channels: 0,
            rate_hz: 0,
            config: MotorOutputConfig::default(),
            readers: Vec::new(),
            pulses: Vec::new(),
            stats: NodeStats::default(),
        }
    }

    fn pulse_for(&self, throttle: f32) -> u16 {
        let range = self.config.max_pulse_us.saturating_sub(self.config.min_pulse_us) as f32;
        let pulse = throttle.clamp(0.0, 1.0) * range;
        (self.config.min_pulse_us as f32 + pulse) as u16
    }
}

impl Node for MotorOutputNode {
    fn kind(&self) -> &'static str {
        "motor_output"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> NodeClass {
        NodeClass::Sink
    }

    fn init(&mut self, descriptor: &NodeDescriptor) -> TalonResult<()> {
        let NodeDescriptor::MotorOutput(desc) = descriptor else {
            return Err(TalonError::kind_mismatch(
                "motor_output descriptor",
                descriptor.kind(),
            ));
        };
        if desc.channels == 0 {
            return Err(TalonError::config("motor output needs at least one channel"));
        }
        if desc.rate_hz == 0 {
            return Err(TalonError::config("bad rate: 0Hz"));
        }
        self.channels = desc.channels;
        self.rate_hz = desc.rate_hz;
        self.readers = (0..desc.channels).map(|_| StreamReader::unbound()).collect();
        self.pulses = vec![self.config.min_pulse_us as u16; desc.channels as usize];
        Ok(())
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::MotorOutput(MotorOutputDescriptor {
            channels: self.channels,
            rate_hz: self.rate_hz,
        })
    }

    fn apply_config(&mut self, config: &NodeConfig) -> TalonResult<()> {
        let NodeConfig::MotorOutput(config) = config else {
            return Err(TalonError::kind_mismatch(
                "motor_output config",
                config.kind(),
            ));
        };
        if config.min_pulse_us >= config.max_pulse_us {
            return Err(TalonError::config("min pulse must be below max pulse"));
        }
        self.config = config.clone();
        Ok(())
    }

    fn config(&self) -> NodeConfig {
        NodeConfig::MotorOutput(self.config.clone())
    }

    fn inputs(&self) -> Vec<PortSpec> {
        (0..self.channels)
            .map(|i| PortSpec {
                name: format!("throttle_{}", i),
                stream_type: StreamType::Throttle,
                rate_hz: self.rate_hz,
            })
            .collect()
    }

    fn bind_input(&mut self, port_idx: usize, stream: Option<&StreamHandle>) -> TalonResult<()> {
        let reader = self
            .readers
            .get_mut(port_idx)
            .ok_or_else(|| TalonError::invalid_input("no such port"))?;
        *reader = match stream {
            Some(handle) => StreamReader::bind(handle)?,
            None => StreamReader::unbound(),
        };
        Ok(())
    }

    fn process(&mut self, _ctx: &TickCtx) {
        for channel in 0..self.readers.len() {
            // freshest sample this tick, idle pulse when the producer is
            // quiet and we never heard from it
            let pulse = match self.readers[channel].samples().and_then(|s| s.last().cloned()) {
                Some(sample) => self.pulse_for(sample.value.0),
                None => self.pulses[channel],
            };
            self.pulses[channel] = pulse;

            let result = self
                .bus
                .lock()
                .write_register(channel as u8, &pulse.to_le_bytes());
            if let Err(err) = result {
                warn!(node = %self.name, channel, %err, "pulse write failed");
                self.stats.record(&err);
            }
        }
    }

    fn stats(&self) -> NodeStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SimulationBus;
    use std::rc::Rc;
    use talon_core::bus::bus_handle;
    use talon_core::stream::Stream;

    fn ticked(node: &mut MotorOutputNode) {
        node.process(&TickCtx {
            tick: 0,
            now_us: 10_000,
            dt_us: 10_000,
        });
    }

    fn pulse_at(bus: &BusHandle, channel: u8) -> u16 {
        let mut raw = [0u8; 2];
        bus.lock().read_register(channel, &mut raw).unwrap();
        u16::from_le_bytes(raw)
    }

    fn sink_with_streams() -> (MotorOutputNode, BusHandle, Vec<Rc<Stream<Throttle>>>) {
        let bus = bus_handle(SimulationBus::new("esc"));
        let mut node = MotorOutputNode::new("motors", bus.clone());
        node.init(&NodeDescriptor::MotorOutput(MotorOutputDescriptor {
            channels: 2,
            rate_hz: 100,
        }))
        .unwrap();
        let streams: Vec<_> = (0..2)
            .map(|i| Stream::<Throttle>::new(format!("mixer/throttle_{}", i), 100).unwrap())
            .collect();
        for (i, stream) in streams.iter().enumerate() {
            let handle: StreamHandle = stream.clone();
            node.bind_input(i, Some(&handle)).unwrap();
        }
        (node, bus, streams)
    }

    #[test]
    fn test_throttle_to_pulse_mapping() {
        let (mut node, bus, streams) = sink_with_streams();
        streams[0].push(Throttle(0.0), 10_000);
        streams[1].push(Throttle(1.0), 10_000);
        ticked(&mut node);
        assert_eq!(pulse_at(&bus, 0), 1000);
        assert_eq!(pulse_at(&bus, 1), 2000);

        streams[0].clear();
        streams[1].clear();
        streams[0].push(Throttle(0.5), 20_000);
        streams[1].push(Throttle(2.0), 20_000); // out of range clamps
        ticked(&mut node);
        assert_eq!(pulse_at(&bus, 0), 1500);
        assert_eq!(pulse_at(&bus, 1), 2000);
    }

    #[test]
    fn test_idles_until_first_sample() {
        let (mut node, bus, streams) = sink_with_streams();
        ticked(&mut node);
        assert_eq!(pulse_at(&bus, 0), 1000);
        assert_eq!(pulse_at(&bus, 1), 1000);

        // a quiet tick keeps the last commanded pulse
        streams[0].push(Throttle(0.75), 10_000);
        ticked(&mut node);
        streams[0].clear();
        ticked(&mut node);
        assert_eq!(pulse_at(&bus, 0), 1750);
    }

    #[test]
    fn test_invalid_pulse_config_rejected() {
        let (mut node, _bus, _streams) = sink_with_streams();
        let err = node.apply_config(&NodeConfig::MotorOutput(MotorOutputConfig {
            min_pulse_us: 2000,
            max_pulse_us: 1000,
        }));
        assert!(err.is_err());
        // previous config still in effect
        assert!(matches!(
            node.config(),
            NodeConfig::MotorOutput(MotorOutputConfig {
                min_pulse_us: 1000,
                max_pulse_us: 2000,
            })
        ));
    }
}
