//! Transport-thread to control-loop handoff
//!
//! External I/O (UART receive buffers, UDP framing) happens on its own
//! threads; they enqueue decoded records here and the graph side drains them
//! with non-blocking reads during its tick. The queue is bounded and lossy:
//! when the control loop falls behind, excess records are dropped rather
//! than blocking the radio thread.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Producer half, held by I/O threads
#[derive(Clone)]
pub struct InboxSender<T> {
    tx: Sender<T>,
}

impl<T> InboxSender<T> {
    /// Enqueue without blocking. Returns false when the record was dropped,
    /// either because the queue is full or the receiver is gone.
    pub fn send(&self, value: T) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer half, drained inside `process`
pub struct Inbox<T> {
    rx: Receiver<T>,
}

impl<T> Inbox<T> {
    /// Take everything queued so far, never blocking
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    /// Take at most one queued record
    pub fn pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create a bounded inbox pair
pub fn inbox<T>(capacity: usize) -> (InboxSender<T>, Inbox<T>) {
    let (tx, rx) = bounded(capacity);
    (InboxSender { tx }, Inbox { rx })
}
