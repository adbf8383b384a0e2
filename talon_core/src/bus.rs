//! Hardware bus handles
//!
//! Every hardware bus (SPI, I²C, UART) is a [`Bus`] behind a mutex; a node
//! claims the mutex for the duration of one bounded transfer and never nests
//! claims across buses. Concrete backends live in the node library — the
//! simulation backend is always available, platform backends are
//! feature-gated there.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TalonResult;

/// Byte-level transfer capability of one bus
///
/// Implementations must not block beyond the transfer itself: the graph tick
/// runs through these calls.
pub trait Bus: Send {
    fn name(&self) -> &str;

    /// Full-duplex transfer: clock out `tx` while filling `rx`
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> TalonResult<()>;

    /// Read a register (register-addressed devices)
    fn read_register(&mut self, reg: u8, out: &mut [u8]) -> TalonResult<()>;

    /// Write data to a register
    fn write_register(&mut self, reg: u8, data: &[u8]) -> TalonResult<()>;
}

/// Shared, mutex-guarded bus handle
pub type BusHandle = Arc<Mutex<dyn Bus>>;

/// Wrap a bus implementation into a shareable handle
pub fn bus_handle<B: Bus + 'static>(bus: B) -> BusHandle {
    Arc::new(Mutex::new(bus))
}
