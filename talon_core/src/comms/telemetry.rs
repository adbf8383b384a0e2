//! Telemetry sample packing
//!
//! Each broadcast frame carries one stream's per-tick samples. The per-sample
//! header is bit-packed to 10 bytes:
//!
//! ```text
//! bytes 0..3   dt, 24 bits, units of 10 µs
//! bytes 3..8   timestamp, 40 bits, monotonic µs
//! bytes 8..10  sample index (15 bits, wrapping) | health (1 bit, MSB)
//! ```
//!
//! The value encoding that follows each header is type-specific
//! ([`StreamValue::write_wire`]).

use serde::{Deserialize, Serialize};

use crate::stream::{ErasedStream, Sample, StreamValue, WireSample};

/// Packed size of one sample header
pub const SAMPLE_HEADER_LEN: usize = 10;

const DT_MASK: u32 = (1 << 24) - 1;
const TS_MASK: u64 = (1 << 40) - 1;
const IDX_MASK: u16 = (1 << 15) - 1;

/// The fixed per-sample wire header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleHeader {
    /// Inter-sample period in 10 µs units (24 bits)
    pub dt_10us: u32,
    /// Monotonic timestamp in µs (40 bits)
    pub timestamp_us: u64,
    /// Wrapping 15-bit sample index
    pub sample_idx: u16,
    pub is_healthy: bool,
}

impl SampleHeader {
    pub fn from_wire(sample: &WireSample) -> Self {
        Self {
            dt_10us: (sample.dt_us / 10) & DT_MASK,
            timestamp_us: sample.timestamp_us & TS_MASK,
            sample_idx: (sample.sample_idx as u16) & IDX_MASK,
            is_healthy: sample.is_healthy,
        }
    }

    pub fn pack(&self) -> [u8; SAMPLE_HEADER_LEN] {
        let mut out = [0u8; SAMPLE_HEADER_LEN];
        out[0..3].copy_from_slice(&self.dt_10us.to_le_bytes()[..3]);
        out[3..8].copy_from_slice(&self.timestamp_us.to_le_bytes()[..5]);
        let tail = (self.sample_idx & IDX_MASK) | u16::from(self.is_healthy) << 15;
        out[8..10].copy_from_slice(&tail.to_le_bytes());
        out
    }

    pub fn unpack(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SAMPLE_HEADER_LEN {
            return None;
        }
        let mut dt = [0u8; 4];
        dt[..3].copy_from_slice(&bytes[0..3]);
        let mut ts = [0u8; 8];
        ts[..5].copy_from_slice(&bytes[3..8]);
        let tail = u16::from_le_bytes([bytes[8], bytes[9]]);
        Some(Self {
            dt_10us: u32::from_le_bytes(dt),
            timestamp_us: u64::from_le_bytes(ts),
            sample_idx: tail & IDX_MASK,
            is_healthy: tail >> 15 == 1,
        })
    }
}

/// One stream's samples for one broadcast period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub stream_id: String,
    pub sample_count: u32,
    /// Concatenated `header + value` records
    pub payload: Vec<u8>,
}

/// Encode a stream's current tick buffer into a telemetry frame
pub fn encode_frame(stream: &dyn ErasedStream) -> TelemetryFrame {
    let samples = stream.wire_samples();
    let mut payload = Vec::new();
    for sample in &samples {
        payload.extend_from_slice(&SampleHeader::from_wire(sample).pack());
        payload.extend_from_slice(&sample.value);
    }
    TelemetryFrame {
        stream_id: stream.id().to_string(),
        sample_count: samples.len() as u32,
        payload,
    }
}

/// Decode a frame back into typed samples (ground-station side)
pub fn decode_samples<T: StreamValue>(frame: &TelemetryFrame) -> Option<Vec<Sample<T>>> {
    let mut out = Vec::with_capacity(frame.sample_count as usize);
    let mut rest = frame.payload.as_slice();
    for _ in 0..frame.sample_count {
        let header = SampleHeader::unpack(rest)?;
        rest = &rest[SAMPLE_HEADER_LEN..];
        let (value, used) = T::read_wire(rest)?;
        rest = &rest[used..];
        out.push(Sample {
            value,
            sample_idx: u64::from(header.sample_idx),
            dt_us: header.dt_10us * 10,
            timestamp_us: header.timestamp_us,
            is_healthy: header.is_healthy,
        });
    }
    if !rest.is_empty() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Stream, Throttle};

    #[test]
    fn test_header_pack_round_trip() {
        let header = SampleHeader {
            dt_10us: 1_000, // 10ms
            timestamp_us: 0x12_3456_789A,
            sample_idx: 0x7ABC & IDX_MASK,
            is_healthy: true,
        };
        let packed = header.pack();
        assert_eq!(SampleHeader::unpack(&packed), Some(header));

        let unhealthy = SampleHeader {
            is_healthy: false,
            ..header
        };
        assert_eq!(SampleHeader::unpack(&unhealthy.pack()), Some(unhealthy));
    }

    #[test]
    fn test_header_field_widths() {
        // 40-bit timestamp and 15-bit index wrap instead of bleeding into
        // neighbouring fields
        let header = SampleHeader {
            dt_10us: DT_MASK,
            timestamp_us: TS_MASK,
            sample_idx: IDX_MASK,
            is_healthy: true,
        };
        let back = SampleHeader::unpack(&header.pack()).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn test_frame_round_trip() {
        let stream = Stream::<Throttle>::new("mixer/throttle_0", 100).unwrap();
        stream.push(Throttle(0.25), 10_000);
        stream.push_with_health(Throttle(0.5), 20_000, false);

        let frame = encode_frame(&*stream);
        assert_eq!(frame.sample_count, 2);
        assert_eq!(frame.stream_id, "mixer/throttle_0");

        let samples = decode_samples::<Throttle>(&frame).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, Throttle(0.25));
        assert_eq!(samples[0].timestamp_us, 10_000);
        assert_eq!(samples[0].dt_us, 10_000);
        assert!(samples[0].is_healthy);
        assert_eq!(samples[1].value, Throttle(0.5));
        assert!(!samples[1].is_healthy);
    }

    #[test]
    fn test_sample_idx_wraps_at_15_bits() {
        let wire = WireSample {
            dt_us: 10_000,
            timestamp_us: 1,
            sample_idx: 0x8000 + 3, // past the 15-bit range
            is_healthy: true,
            value: Vec::new(),
        };
        assert_eq!(SampleHeader::from_wire(&wire).sample_idx, 3);
    }
}
