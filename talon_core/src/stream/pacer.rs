//! Rate pacing for sample producers

/// Decides how many samples a producer owes each tick
///
/// Every producer computes `samples_needed = floor((now − last_tp) · rate)`
/// and advances `last_tp` by `samples_needed / rate`, so the long-run output
/// rate matches the stream rate regardless of tick jitter.
#[derive(Debug, Clone)]
pub struct Pacer {
    dt_us: u64,
    last_tp_us: u64,
}

impl Pacer {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            dt_us: 1_000_000 / u64::from(rate_hz.max(1)),
            last_tp_us: 0,
        }
    }

    /// Reset the pacing origin (scheduler start)
    pub fn start(&mut self, origin_us: u64) {
        self.last_tp_us = origin_us;
    }

    /// Nominal inter-sample period in microseconds
    pub fn dt_us(&self) -> u64 {
        self.dt_us
    }

    /// Timestamps of the samples owed up to `now_us`, advancing the pacer
    pub fn timestamps_until(&mut self, now_us: u64) -> Vec<u64> {
        if now_us <= self.last_tp_us {
            return Vec::new();
        }
        let count = (now_us - self.last_tp_us) / self.dt_us;
        let mut out = Vec::with_capacity(count as usize);
        for k in 1..=count {
            out.push(self.last_tp_us + k * self.dt_us);
        }
        self.last_tp_us += count * self.dt_us;
        out
    }
}
