//! Fixed-tick cooperative scheduling
//!
//! One thread, one graph, one fixed period. See [`Scheduler`].

mod scheduler;

pub use scheduler::{Scheduler, SchedulerConfig};
