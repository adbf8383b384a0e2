//! Multi-input sample alignment
//!
//! Processors consuming several same-rate streams accumulate each input into
//! a queue and pop aligned tuples whenever every queue has a sample. When the
//! queues drift apart by more than [`DRIFT_LIMIT`] samples — a producer
//! stalled or double-produced — both are truncated to the shortest and the
//! caller is told, so it can log the divergence and keep running.

use std::collections::VecDeque;

use crate::error::{TalonError, TalonResult};
use crate::stream::sample::Sample;
use crate::stream::values::StreamValue;

/// Maximum tolerated queue-length divergence between inputs
pub const DRIFT_LIMIT: usize = 30;

macro_rules! accumulator {
    ($name:ident, $(($slot:ident, $ty:ident)),+) => {
        /// Aligns samples from its input streams into tuples
        pub struct $name<$($ty: StreamValue),+> {
            $($slot: VecDeque<Sample<$ty>>,)+
        }

        impl<$($ty: StreamValue),+> $name<$($ty),+> {
            pub fn new() -> Self {
                Self {
                    $($slot: VecDeque::new(),)+
                }
            }

            /// Append this tick's samples from every input
            ///
            /// Returns `BufferDrift` after truncating to the shortest queue
            /// when the inputs diverged past the limit; the accumulator stays
            /// usable.
            pub fn accumulate(&mut self, $($slot: &[Sample<$ty>]),+) -> TalonResult<()> {
                $(self.$slot.extend($slot.iter().cloned());)+
                let lens = [$(self.$slot.len()),+];
                let shortest = *lens.iter().min().unwrap();
                let longest = *lens.iter().max().unwrap();
                let drift = longest - shortest;
                if drift > DRIFT_LIMIT {
                    $(self.$slot.truncate(shortest);)+
                    return Err(TalonError::BufferDrift {
                        drift,
                        limit: DRIFT_LIMIT,
                    });
                }
                Ok(())
            }

            /// Pop one aligned tuple, oldest first
            pub fn pop(&mut self) -> Option<($(Sample<$ty>),+)> {
                if $(self.$slot.is_empty())||+ {
                    return None;
                }
                Some(($(self.$slot.pop_front().unwrap()),+))
            }

            /// Samples waiting in the shortest queue
            pub fn ready(&self) -> usize {
                [$(self.$slot.len()),+].into_iter().min().unwrap()
            }

            pub fn clear(&mut self) {
                $(self.$slot.clear();)+
            }
        }

        impl<$($ty: StreamValue),+> Default for $name<$($ty),+> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

accumulator!(Accumulator2, (a, A), (b, B));
accumulator!(Accumulator3, (a, A), (b, B), (c, C));
