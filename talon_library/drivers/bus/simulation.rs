//! Simulation bus driver
//!
//! Simulates a register-addressed bus device with a configurable register
//! map. Register-addressed reads return the stored bytes (zero-padded);
//! writes store them. Full-duplex transfers treat the first tx byte as the
//! register address. Sensor-specific conversion latencies are not modeled:
//! a conversion command doubles as the address its result is read from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use talon_core::bus::Bus;
use talon_core::error::{TalonError, TalonResult};

/// In-memory register-map bus
pub struct SimulationBus {
    name: String,
    registers: HashMap<u8, Vec<u8>>,
    failing: Arc<AtomicBool>,
}

impl SimulationBus {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            registers: HashMap::new(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Preloaded with an MS5611-style barometer: PROM calibration words at
    /// 0xA2..0xAC and raw conversion results readable at the convert
    /// commands. The values are the datasheet reference conditions
    /// (20.07 °C, 1000.09 mbar).
    pub fn with_ms5611_defaults(name: &str) -> Self {
        let mut bus = Self::new(name);
        let prom: [u16; 6] = [40127, 36924, 23317, 23282, 33464, 28312];
        for (i, word) in prom.iter().enumerate() {
            bus.set_register(0xA2 + 2 * i as u8, &word.to_be_bytes());
        }
        bus.set_register(0x48, &9_085_466u32.to_be_bytes()[1..]); // D1, 24-bit
        bus.set_register(0x58, &8_569_150u32.to_be_bytes()[1..]); // D2, 24-bit
        bus
    }

    /// Set a register's stored bytes
    pub fn set_register(&mut self, reg: u8, data: &[u8]) {
        self.registers.insert(reg, data.to_vec());
    }

    pub fn register(&self, reg: u8) -> Option<&[u8]> {
        self.registers.get(&reg).map(Vec::as_slice)
    }

    /// Make every transfer fail until cleared, to exercise degraded paths
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Shared flag controlling [`Self::set_failing`], usable after the bus
    /// has been moved behind a handle
    pub fn failure_flag(&self) -> Arc<AtomicBool> {
        self.failing.clone()
    }

    fn check(&self) -> TalonResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TalonError::bus(&self.name, "simulated transfer failure"));
        }
        Ok(())
    }

    fn fill(&self, reg: u8, out: &mut [u8]) {
        let stored = self.registers.get(&reg);
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = stored.and_then(|d| d.get(i)).copied().unwrap_or(0);
        }
    }
}

impl Bus for SimulationBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> TalonResult<()> {
        self.check()?;
        let reg = tx.first().copied().unwrap_or(0);
        self.fill(reg, rx);
        Ok(())
    }

    fn read_register(&mut self, reg: u8, out: &mut [u8]) -> TalonResult<()> {
        self.check()?;
        self.fill(reg, out);
        Ok(())
    }

    fn write_register(&mut self, reg: u8, data: &[u8]) -> TalonResult<()> {
        self.check()?;
        self.registers.insert(reg, data.to_vec());
        Ok(())
    }
}
