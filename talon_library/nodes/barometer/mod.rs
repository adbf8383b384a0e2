//! MS5611-style barometer source
//!
//! Reads factory calibration words from the sensor PROM at init, then samples
//! raw pressure (D1) and temperature (D2) conversions over the bus and
//! applies the first- and second-order temperature compensation from the
//! datasheet. Pressure is published at the descriptor rate; temperature at
//! half that, matching the sensor's alternating conversion cadence.
//!
//! Bus failures degrade: the last compensated reading is re-published with
//! the health bit cleared and the node's error counter bumped.

use std::rc::Rc;

use tracing::warn;

use talon_core::bus::BusHandle;
use talon_core::error::{TalonError, TalonResult};
use talon_core::graph::{
    BarometerConfig, BarometerDescriptor, Node, NodeClass, NodeConfig, NodeDescriptor, NodeStats,
    OutputSpec, PortSpec, TickCtx,
};
use talon_core::stream::{Pacer, Pressure, Stream, Temperature};

const PROM_BASE: u8 = 0xA2;
/// Convert + read D1 (pressure), OSR 4096
const CMD_CONVERT_D1: u8 = 0x48;
/// Convert + read D2 (temperature), OSR 4096
const CMD_CONVERT_D2: u8 = 0x58;

/// Factory calibration from the sensor PROM
#[derive(Debug, Clone, Copy, Default)]
struct Calibration {
    c1: u16,
    c2: u16,
    c3: u16,
    c4: u16,
    c5: u16,
    c6: u16,
}

/// Datasheet compensation: raw D1/D2 to (Pa, °C)
fn compensate(cal: &Calibration, d1: u32, d2: u32) -> (f64, f32) {
    let dt = i64::from(d2) - (i64::from(cal.c5) << 8);
    let mut temp = 2000 + ((dt * i64::from(cal.c6)) >> 23);
    let mut off = (i64::from(cal.c2) << 16) + ((i64::from(cal.c4) * dt) >> 7);
    let mut sens = (i64::from(cal.c1) << 15) + ((i64::from(cal.c3) * dt) >> 8);

    // second-order compensation below 20 °C
    if temp < 2000 {
        let t2 = (dt * dt) >> 31;
        let mut off2 = 5 * (temp - 2000) * (temp - 2000) / 2;
        let mut sens2 = off2 / 2;
        if temp < -1500 {
            off2 += 7 * (temp + 1500) * (temp + 1500);
            sens2 += 11 * (temp + 1500) * (temp + 1500) / 2;
        }
        temp -= t2;
        off -= off2;
        sens -= sens2;
    }

    let pressure = ((i64::from(d1) * sens >> 21) - off) >> 15;
    (pressure as f64, temp as f32 / 100.0)
}

pub struct BarometerNode {
    name: String,
    bus: BusHandle,
    rate_hz: u32,
    config: BarometerConfig,
    calibration: Calibration,
    pressure_out: Option<Rc<Stream<Pressure>>>,
    temperature_out: Option<Rc<Stream<Temperature>>>,
    pacer: Pacer,
    /// Alternates D2 refreshes across pressure slots
    slot: u64,
    last_d2: u32,
    last_reading: (f64, f32),
    stats: NodeStats,
}

impl BarometerNode {
    pub fn new(name: &str, bus: BusHandle) -> Self {
        Self {
            name: name.to_string(),
            bus,
            rate_hz: 0,
            config: BarometerConfig::default(),
            calibration: Calibration::default(),
            pressure_out: None,
            temperature_out: None,
            pacer: Pacer::new(1),
            slot: 0,
            last_d2: 0,
            last_reading: (0.0, 0.0),
            stats: NodeStats::default(),
        }
    }

    fn read_u16(&self, reg: u8) -> TalonResult<u16> {
        let mut raw = [0u8; 2];
        self.bus.lock().read_register(reg, &mut raw)?;
        Ok(u16::from_be_bytes(raw))
    }

    fn read_u24(&self, reg: u8) -> TalonResult<u32> {
        let mut raw = [0u8; 3];
        self.bus.lock().read_register(reg, &mut raw)?;
        Ok(u32::from_be_bytes([0, raw[0], raw[1], raw[2]]))
    }

    /// One conversion cycle: refresh D2 on even slots, read D1 every slot
    fn sample(&mut self) -> TalonResult<(f64, f32)> {
        if self.slot % 2 == 0 || self.last_d2 == 0 {
            self.last_d2 = self.read_u24(CMD_CONVERT_D2)?;
        }
        let d1 = self.read_u24(CMD_CONVERT_D1)?;
        let (pressure, temperature) = compensate(&self.calibration, d1, self.last_d2);
        Ok((pressure + self.config.pressure_bias, temperature))
    }
}

impl Node for BarometerNode {
    fn kind(&self) -> &'static str {
        "barometer"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> NodeClass {
        NodeClass::Source
    }

    fn init(&mut self, descriptor: &NodeDescriptor) -> TalonResult<()> {
        let NodeDescriptor::Barometer(desc) = descriptor else {
            return Err(TalonError::kind_mismatch(
                "barometer descriptor",
                descriptor.kind(),
            ));
        };
        if desc.rate_hz < 2 {
            return Err(TalonError::config("barometer rate must be at least 2Hz"));
        }
        self.calibration = Calibration {
            c1: self.read_u16(PROM_BASE)?,
            c2: self.read_u16(PROM_BASE + 2)?,
            c3: self.read_u16(PROM_BASE + 4)?,
            c4: self.read_u16(PROM_BASE + 6)?,
            c5: self.read_u16(PROM_BASE + 8)?,
            c6: self.read_u16(PROM_BASE + 10)?,
        };
        self.rate_hz = desc.rate_hz;
        self.pacer = Pacer::new(desc.rate_hz);
        self.pressure_out = Some(Stream::new(
            format!("{}/pressure", self.name),
            desc.rate_hz,
        )?);
        self.temperature_out = Some(Stream::new(
            format!("{}/temperature", self.name),
            desc.rate_hz / 2,
        )?);
        Ok(())
    }

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::Barometer(BarometerDescriptor {
            rate_hz: self.rate_hz,
        })
    }

    fn apply_config(&mut self, config: &NodeConfig) -> TalonResult<()> {
        let NodeConfig::Barometer(config) = config else {
            return Err(TalonError::kind_mismatch("barometer config", config.kind()));
        };
        self.config = config.clone();
        Ok(())
    }

    fn config(&self) -> NodeConfig {
        NodeConfig::Barometer(self.config.clone())
    }

    fn inputs(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        match (&self.pressure_out, &self.temperature_out) {
            (Some(pressure), Some(temperature)) => vec![
                OutputSpec {
                    name: "pressure".into(),
                    stream: pressure.clone(),
                },
                OutputSpec {
                    name: "temperature".into(),
                    stream: temperature.clone(),
                },
            ],
            _ => Vec::new(),
        }
    }

    fn start(&mut self, origin_us: u64) {
        self.pacer.start(origin_us);
    }

    fn process(&mut self, ctx: &TickCtx) {
        let (Some(pressure_out), Some(temperature_out)) =
            (self.pressure_out.clone(), self.temperature_out.clone())
        else {
            warn!(node = %self.name, "process before init");
            return;
        };
        pressure_out.clear();
        temperature_out.clear();

        for ts in self.pacer.timestamps_until(ctx.now_us) {
            let (reading, is_healthy) = match self.sample() {
                Ok(reading) => {
                    self.last_reading = reading;
                    (reading, true)
                }
                Err(err) => {
                    warn!(node = %self.name, %err, "bus transfer failed");
                    self.stats.record(&err);
                    (self.last_reading, false)
                }
            };
            pressure_out.push_with_health(Pressure(reading.0), ts, is_healthy);
            if self.slot % 2 == 0 {
                temperature_out.push_with_health(Temperature(reading.1), ts, is_healthy);
            }
            self.slot += 1;
        }
    }

    fn stats(&self) -> NodeStats {
        self.stats.clone()
    }
}
