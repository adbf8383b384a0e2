//! Typed, rate-tagged sample streams
//!
//! A stream is a single-producer broadcast channel scoped to one tick: the
//! producer clears it at the start of its `process` and pushes the samples it
//! generated this tick; consumers read the buffer within the same tick and
//! never retain references past the tick boundary. The sample index keeps
//! counting across the stream's whole lifetime.
//!
//! Streams are owned (`Rc`) by the node that produces them; consumers hold
//! [`StreamReader`]s backed by `Weak` references resolved at bind time.

mod accumulator;
mod pacer;
mod sample;
#[allow(clippy::module_inception)]
mod stream;
mod values;

pub use accumulator::{Accumulator2, Accumulator3, DRIFT_LIMIT};
pub use pacer::Pacer;
pub use sample::{Sample, WireSample};
pub use stream::{downcast_stream, ErasedStream, Stream, StreamHandle, StreamReader, StreamSpec};
pub use values::{
    Acceleration, Adc, AngularVelocity, Current, Distance, EcefPosition, EcefVelocity, Force,
    GpsFix, GpsInfo, MagneticField, Pressure, Scalar, StreamType, StreamValue, Temperature,
    Throttle, Torque,
};
