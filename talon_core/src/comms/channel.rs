//! Virtual lane QoS
//!
//! The transport multiplexes four lanes with very different delivery
//! contracts. The core only describes them; it never frames bytes itself.

use serde::{Deserialize, Serialize};

/// The four virtual lanes over the RF/UDP transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    /// Node setup and configuration
    Setup,
    /// Pilot inputs
    Input,
    /// Stream telemetry
    Telemetry,
    /// Camera feed
    Video,
}

/// Delivery contract of one lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneSpec {
    pub lane: Lane,
    /// Retransmit until acknowledged
    pub reliable: bool,
    pub compressed: bool,
    pub mtu: usize,
    /// Lower is more urgent
    pub priority: u8,
    /// Drop data older than this instead of delivering late
    pub latency_bound_ms: Option<u32>,
    /// Unsent data is discarded when fresher data arrives (latest-wins)
    pub cancel_on_new_data: bool,
}

/// The lane table the transport is expected to honour
pub fn lane_table() -> [LaneSpec; 4] {
    [
        LaneSpec {
            lane: Lane::Setup,
            reliable: true,
            compressed: true,
            mtu: 508,
            priority: 0,
            latency_bound_ms: None,
            cancel_on_new_data: false,
        },
        LaneSpec {
            lane: Lane::Input,
            reliable: false,
            compressed: true,
            mtu: 508,
            priority: 1,
            latency_bound_ms: Some(50),
            cancel_on_new_data: true,
        },
        LaneSpec {
            lane: Lane::Telemetry,
            reliable: false,
            compressed: true,
            mtu: 1024,
            priority: 2,
            latency_bound_ms: Some(200),
            cancel_on_new_data: false,
        },
        LaneSpec {
            lane: Lane::Video,
            reliable: false,
            compressed: false,
            mtu: 8192,
            priority: 3,
            latency_bound_ms: Some(150),
            cancel_on_new_data: false,
        },
    ]
}
