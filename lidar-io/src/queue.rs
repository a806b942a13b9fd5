//! Bounded queue with drop-oldest overflow
//!
//! Producers never block: when the queue is full the oldest entry is
//! discarded to make room. Used for per-connection outbound frames and for
//! driver event subscriptions, where only recent data matters.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Bounded MPMC queue that drops its oldest entry on overflow
pub struct DropOldestQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    dropped: AtomicU64,
}

impl<T> DropOldestQueue<T> {
    /// Create a queue holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Push without blocking; returns true if an older entry was dropped
    pub fn push(&self, mut item: T) -> bool {
        let mut evicted = false;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(back)) => {
                    if self.rx.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        evicted = true;
                    }
                    item = back;
                }
                // Both ends live in this struct, so the channel cannot disconnect
                Err(TrySendError::Disconnected(_)) => return evicted,
            }
        }
    }

    /// Pop the oldest entry, waiting up to `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Pop the oldest entry if one is ready
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Receiver handle for consumers that want `select!`/iteration
    pub fn receiver(&self) -> Receiver<T> {
        self.rx.clone()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Entries discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
