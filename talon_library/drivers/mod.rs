//! Bus backends
//!
//! Backends implement [`talon_core::bus::Bus`]. The simulation backend is
//! always available; platform backends (Linux spidev/i2cdev) are added behind
//! feature gates as hardware support lands.

pub mod bus;

pub use bus::SimulationBus;
