//! Typed stream buffers and their erased graph-facing form

use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::error::{TalonError, TalonResult};
use crate::stream::sample::{Sample, WireSample};
use crate::stream::values::{StreamType, StreamValue};

/// Identity and shape of a stream, as seen by the graph validator and the
/// remote surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// `"<node>/<output-name>"`
    pub id: String,
    pub stream_type: StreamType,
    pub rate_hz: u32,
}

/// A single-producer stream of `Sample<T>`
///
/// The producer node owns the `Rc`; everything handed to consumers is a
/// `Weak`. The per-tick buffer holds only samples produced since the last
/// `clear`.
pub struct Stream<T: StreamValue> {
    id: String,
    rate_hz: u32,
    dt_us: u32,
    buf: RefCell<Vec<Sample<T>>>,
    last: RefCell<Option<Sample<T>>>,
    next_idx: Cell<u64>,
    last_timestamp_us: Cell<u64>,
}

impl<T: StreamValue> Stream<T> {
    /// Allocate a stream; the rate is fixed for the stream's lifetime
    pub fn new(id: impl Into<String>, rate_hz: u32) -> TalonResult<Rc<Self>> {
        if rate_hz == 0 {
            return Err(TalonError::config("bad rate: 0Hz"));
        }
        Ok(Rc::new(Self {
            id: id.into(),
            rate_hz,
            dt_us: 1_000_000 / rate_hz,
            buf: RefCell::new(Vec::new()),
            last: RefCell::new(None),
            next_idx: Cell::new(0),
            last_timestamp_us: Cell::new(0),
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Nominal inter-sample period in microseconds
    pub fn dt_us(&self) -> u32 {
        self.dt_us
    }

    pub fn spec(&self) -> StreamSpec {
        StreamSpec {
            id: self.id.clone(),
            stream_type: T::STREAM_TYPE,
            rate_hz: self.rate_hz,
        }
    }

    /// Drop this tick's samples; the running sample index survives
    pub fn clear(&self) {
        self.buf.borrow_mut().clear();
    }

    /// Number of samples in this tick's buffer
    pub fn len(&self) -> usize {
        self.buf.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.borrow().is_empty()
    }

    /// Push a healthy sample
    pub fn push(&self, value: T, timestamp_us: u64) {
        self.push_with_health(value, timestamp_us, true);
    }

    /// Push a sample, marking it unhealthy when it was synthesized without
    /// fresh data
    pub fn push_with_health(&self, value: T, timestamp_us: u64, is_healthy: bool) {
        // producers must push in timestamp order
        debug_assert!(
            timestamp_us >= self.last_timestamp_us.get(),
            "stream '{}': timestamp went backwards",
            self.id
        );
        self.last_timestamp_us.set(timestamp_us);

        let sample = Sample {
            value,
            sample_idx: self.next_idx.get(),
            dt_us: self.dt_us,
            timestamp_us,
            is_healthy,
        };
        self.next_idx.set(sample.sample_idx + 1);
        *self.last.borrow_mut() = Some(sample.clone());
        self.buf.borrow_mut().push(sample);
    }

    /// Samples produced this tick
    pub fn samples(&self) -> Ref<'_, [Sample<T>]> {
        Ref::map(self.buf.borrow(), Vec::as_slice)
    }

    /// Most recent sample ever pushed (survives `clear`)
    pub fn latest(&self) -> Option<Sample<T>> {
        self.last.borrow().clone()
    }
}

/// Type-erased view of a stream, what the graph and telemetry tap see
pub trait ErasedStream {
    fn id(&self) -> &str;
    fn stream_type(&self) -> StreamType;
    fn rate_hz(&self) -> u32;
    /// Number of samples in this tick's buffer
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&self);
    fn spec(&self) -> StreamSpec;
    /// This tick's samples with their values wire-encoded, for telemetry
    fn wire_samples(&self) -> Vec<WireSample>;
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: StreamValue> ErasedStream for Stream<T> {
    fn id(&self) -> &str {
        self.id()
    }

    fn stream_type(&self) -> StreamType {
        T::STREAM_TYPE
    }

    fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn clear(&self) {
        self.clear();
    }

    fn spec(&self) -> StreamSpec {
        self.spec()
    }

    fn wire_samples(&self) -> Vec<WireSample> {
        self.buf
            .borrow()
            .iter()
            .map(|s| {
                let mut value = Vec::new();
                s.value.write_wire(&mut value);
                WireSample {
                    dt_us: s.dt_us,
                    timestamp_us: s.timestamp_us,
                    sample_idx: s.sample_idx,
                    is_healthy: s.is_healthy,
                    value,
                }
            })
            .collect()
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Shared handle to an erased stream
pub type StreamHandle = Rc<dyn ErasedStream>;

/// Recover the typed stream behind an erased handle
pub fn downcast_stream<T: StreamValue>(handle: &StreamHandle) -> Option<Rc<Stream<T>>> {
    handle.clone().as_any_rc().downcast::<Stream<T>>().ok()
}

/// Consumer-side binding to a producer's stream
///
/// Holds a `Weak` reference resolved at bind time; if the producer is removed
/// from the graph the reader silently reads as unbound.
#[derive(Debug)]
pub struct StreamReader<T: StreamValue> {
    stream: Weak<Stream<T>>,
}

impl<T: StreamValue> StreamReader<T> {
    /// A reader bound to nothing
    pub fn unbound() -> Self {
        Self { stream: Weak::new() }
    }

    /// Bind to an erased handle, checking the element type
    pub fn bind(handle: &StreamHandle) -> TalonResult<Self> {
        let typed = downcast_stream::<T>(handle).ok_or_else(|| TalonError::TypeMismatch {
            stream: handle.id().to_string(),
            expected: T::STREAM_TYPE.to_string(),
            got: handle.stream_type().to_string(),
        })?;
        Ok(Self {
            stream: Rc::downgrade(&typed),
        })
    }

    pub fn is_bound(&self) -> bool {
        self.stream.strong_count() > 0
    }

    /// Clone out this tick's samples, or `None` when unbound
    pub fn samples(&self) -> Option<Vec<Sample<T>>> {
        self.stream.upgrade().map(|s| s.samples().to_vec())
    }

    /// Most recent sample ever pushed by the producer
    pub fn latest(&self) -> Option<Sample<T>> {
        self.stream.upgrade().and_then(|s| s.latest())
    }

    pub fn rate_hz(&self) -> Option<u32> {
        self.stream.upgrade().map(|s| s.rate_hz())
    }
}

impl<T: StreamValue> Default for StreamReader<T> {
    fn default() -> Self {
        Self::unbound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::values::{Throttle, Torque};

    // =========================================================================
    // Sample index / buffer contract
    // =========================================================================

    #[test]
    fn test_sample_idx_monotonic_across_clears() {
        let s = Stream::<Throttle>::new("mixer/throttle_0", 100).unwrap();
        s.push(Throttle(0.1), 0);
        s.push(Throttle(0.2), 10_000);
        assert_eq!(s.len(), 2);

        s.clear();
        assert_eq!(s.len(), 0);

        s.push(Throttle(0.3), 20_000);
        let samples = s.samples();
        assert_eq!(samples.len(), 1);
        // index 2: continues after the two pre-clear samples
        assert_eq!(samples[0].sample_idx, 2);
        assert_eq!(samples[0].dt_us, 10_000);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(Stream::<Throttle>::new("x/out", 0).is_err());
    }

    #[test]
    fn test_latest_survives_clear() {
        let s = Stream::<Throttle>::new("mixer/throttle_0", 50).unwrap();
        s.push_with_health(Throttle(0.7), 5_000, false);
        s.clear();
        let last = s.latest().unwrap();
        assert_eq!(last.value, Throttle(0.7));
        assert!(!last.is_healthy);
    }

    // =========================================================================
    // Erasure / readers
    // =========================================================================

    #[test]
    fn test_downcast_and_reader() {
        let s = Stream::<Throttle>::new("mixer/throttle_0", 100).unwrap();
        let handle: StreamHandle = s.clone();
        assert_eq!(handle.stream_type(), StreamType::Throttle);

        let reader = StreamReader::<Throttle>::bind(&handle).unwrap();
        assert!(reader.is_bound());
        s.push(Throttle(0.5), 0);
        assert_eq!(reader.samples().unwrap().len(), 1);

        // wrong element type refuses to bind
        let err = StreamReader::<Torque>::bind(&handle).unwrap_err();
        assert!(matches!(err, TalonError::TypeMismatch { .. }));
    }

    #[test]
    fn test_reader_goes_stale_with_producer() {
        let s = Stream::<Throttle>::new("mixer/throttle_0", 100).unwrap();
        let handle: StreamHandle = s.clone();
        let reader = StreamReader::<Throttle>::bind(&handle).unwrap();
        drop(handle);
        drop(s);
        assert!(!reader.is_bound());
        assert!(reader.samples().is_none());
    }

    #[test]
    fn test_wire_samples() {
        let s = Stream::<Throttle>::new("mixer/throttle_0", 100).unwrap();
        s.push(Throttle(1.0), 10_000);
        let wire = ErasedStream::wire_samples(&*s);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].value, 1.0f32.to_le_bytes().to_vec());
        assert_eq!(wire[0].timestamp_us, 10_000);
    }
}
