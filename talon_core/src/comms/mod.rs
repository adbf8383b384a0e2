//! Remote configuration and telemetry surface
//!
//! The core does not own a transport: it consumes decoded [`Request`]s and
//! produces [`Reply`]s and [`TelemetryFrame`]s, leaving framing, compression
//! and delivery to whatever link the vehicle carries. [`LaneSpec`] describes
//! the QoS the four virtual lanes expect from that link.

mod channel;
mod command;
mod inbox;
mod remote;
mod telemetry;

pub use channel::{lane_table, Lane, LaneSpec};
pub use command::{Command, NodePortState, NodeState, Reply, Request, Response};
pub use inbox::{inbox, Inbox, InboxSender};
pub use remote::RemoteHandler;
pub use telemetry::{decode_samples, encode_frame, SampleHeader, TelemetryFrame, SAMPLE_HEADER_LEN};
