//! Semantic stream element types
//!
//! Each payload newtype pins the physical meaning and unit of a stream, so
//! two streams carrying "an f32" cannot be cross-wired by accident: a
//! throttle is not a distance. [`StreamType`] is the erased tag the graph
//! validator compares against port requirements.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Erased element-type tag of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    Throttle,
    Torque,
    Force,
    AngularVelocity,
    Acceleration,
    MagneticField,
    Pressure,
    Temperature,
    Distance,
    GpsInfo,
    EcefPosition,
    EcefVelocity,
    Adc,
    Current,
    Scalar,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StreamType::Throttle => "throttle",
            StreamType::Torque => "torque",
            StreamType::Force => "force",
            StreamType::AngularVelocity => "angular_velocity",
            StreamType::Acceleration => "acceleration",
            StreamType::MagneticField => "magnetic_field",
            StreamType::Pressure => "pressure",
            StreamType::Temperature => "temperature",
            StreamType::Distance => "distance",
            StreamType::GpsInfo => "gps_info",
            StreamType::EcefPosition => "ecef_position",
            StreamType::EcefVelocity => "ecef_velocity",
            StreamType::Adc => "adc",
            StreamType::Current => "current",
            StreamType::Scalar => "scalar",
        };
        f.write_str(name)
    }
}

/// A payload type that can ride a stream
pub trait StreamValue: Clone + std::fmt::Debug + PartialEq + 'static {
    const STREAM_TYPE: StreamType;

    /// Append the wire encoding of this value (little-endian, fixed width)
    fn write_wire(&self, out: &mut Vec<u8>);

    /// Decode one value from the front of `bytes`, returning it and the
    /// number of bytes consumed
    fn read_wire(bytes: &[u8]) -> Option<(Self, usize)>;
}

macro_rules! scalar_stream_value {
    ($name:ident, $inner:ty, $tag:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl StreamValue for $name {
            const STREAM_TYPE: StreamType = $tag;

            fn write_wire(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.0.to_le_bytes());
            }

            fn read_wire(bytes: &[u8]) -> Option<(Self, usize)> {
                const W: usize = std::mem::size_of::<$inner>();
                let raw: [u8; W] = bytes.get(..W)?.try_into().ok()?;
                Some((Self(<$inner>::from_le_bytes(raw)), W))
            }
        }
    };
}

macro_rules! vec3_stream_value {
    ($name:ident, $comp:ty, $tag:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub Vector3<$comp>);

        impl Default for $name {
            fn default() -> Self {
                Self(Vector3::zeros())
            }
        }

        impl StreamValue for $name {
            const STREAM_TYPE: StreamType = $tag;

            fn write_wire(&self, out: &mut Vec<u8>) {
                for c in self.0.iter() {
                    out.extend_from_slice(&c.to_le_bytes());
                }
            }

            fn read_wire(bytes: &[u8]) -> Option<(Self, usize)> {
                const W: usize = std::mem::size_of::<$comp>();
                if bytes.len() < 3 * W {
                    return None;
                }
                let mut comps = [<$comp>::default(); 3];
                for (i, comp) in comps.iter_mut().enumerate() {
                    let raw: [u8; W] = bytes[i * W..(i + 1) * W].try_into().ok()?;
                    *comp = <$comp>::from_le_bytes(raw);
                }
                Some((Self(Vector3::new(comps[0], comps[1], comps[2])), 3 * W))
            }
        }
    };
}

// Scalar payloads
scalar_stream_value!(Throttle, f32, StreamType::Throttle, "Motor throttle, 0..1");
scalar_stream_value!(Pressure, f64, StreamType::Pressure, "Barometric pressure, Pa");
scalar_stream_value!(Temperature, f32, StreamType::Temperature, "Temperature, °C");
scalar_stream_value!(Distance, f32, StreamType::Distance, "Range measurement, m");
scalar_stream_value!(Adc, f32, StreamType::Adc, "Raw ADC reading, 0..1 of full scale");
scalar_stream_value!(Current, f32, StreamType::Current, "Electric current, A");
scalar_stream_value!(Scalar, f32, StreamType::Scalar, "Untyped scalar, for generators and taps");

// Vector payloads
vec3_stream_value!(Torque, f32, StreamType::Torque, "Body-frame torque, N·m");
vec3_stream_value!(Force, f32, StreamType::Force, "Body-frame force, N");
vec3_stream_value!(
    AngularVelocity,
    f32,
    StreamType::AngularVelocity,
    "Body-frame angular velocity, rad/s"
);
vec3_stream_value!(
    Acceleration,
    f32,
    StreamType::Acceleration,
    "Body-frame specific force, m/s²"
);
vec3_stream_value!(
    MagneticField,
    f32,
    StreamType::MagneticField,
    "Body-frame magnetic field, µT"
);
vec3_stream_value!(
    EcefPosition,
    f64,
    StreamType::EcefPosition,
    "ECEF-frame position, m"
);
vec3_stream_value!(
    EcefVelocity,
    f32,
    StreamType::EcefVelocity,
    "ECEF-frame velocity, m/s"
);

/// GPS fix quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GpsFix {
    #[default]
    None,
    Fix2D,
    Fix3D,
}

/// `gps_info` stream payload
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpsInfo {
    pub fix: GpsFix,
    pub visible_satellites: u8,
    pub fix_satellites: u8,
    /// Position accuracy estimate, m
    pub pacc: f32,
    /// Velocity accuracy estimate, m/s
    pub vacc: f32,
}

impl StreamValue for GpsInfo {
    const STREAM_TYPE: StreamType = StreamType::GpsInfo;

    fn write_wire(&self, out: &mut Vec<u8>) {
        out.push(match self.fix {
            GpsFix::None => 0,
            GpsFix::Fix2D => 1,
            GpsFix::Fix3D => 2,
        });
        out.push(self.visible_satellites);
        out.push(self.fix_satellites);
        out.extend_from_slice(&self.pacc.to_le_bytes());
        out.extend_from_slice(&self.vacc.to_le_bytes());
    }

    fn read_wire(bytes: &[u8]) -> Option<(Self, usize)> {
        if bytes.len() < 11 {
            return None;
        }
        let fix = match bytes[0] {
            0 => GpsFix::None,
            1 => GpsFix::Fix2D,
            2 => GpsFix::Fix3D,
            _ => return None,
        };
        let pacc = f32::from_le_bytes(bytes[3..7].try_into().ok()?);
        let vacc = f32::from_le_bytes(bytes[7..11].try_into().ok()?);
        Some((
            Self {
                fix,
                visible_satellites: bytes[1],
                fix_satellites: bytes[2],
                pacc,
                vacc,
            },
            11,
        ))
    }
}
