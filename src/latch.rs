//! Single-slot, most-recent-wins handoff buffers shared between threads.
//!
//! A latch holds exactly one value. Writers overwrite it without waiting for
//! readers, readers get a clone and never disturb the slot. Intermediate
//! values written between two reads are dropped; the pipeline only
//! ever cares about the newest frame or parameter snapshot.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking writer cannot leave a single assignment half done.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Overwrite-on-write, copy-on-read slot.
#[derive(Debug, Default)]
pub struct Latch<T> {
    slot: Mutex<T>,
}

impl<T: Clone> Latch<T> {
    /// Create a latch holding `initial`
    pub const fn new(initial: T) -> Self {
        Self {
            slot: Mutex::new(initial),
        }
    }

    /// Replace the held value
    pub fn write(&self, value: T) {
        *lock(&self.slot) = value;
    }

    /// Copy of the held value
    pub fn read(&self) -> T {
        lock(&self.slot).clone()
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    available: bool,
}

/// Latch with an availability signal for a blocking consumer.
///
/// `read_blocking` waits until a write happened since the previous blocking
/// read returned, then clears the signal. Multiple writes in between collapse
/// into the newest one.
#[derive(Debug)]
pub struct BlockingLatch<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for BlockingLatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingLatch<T> {
    /// Create an empty latch
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                available: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Replace the held value and signal availability
    pub fn write(&self, value: T) {
        let mut slot = lock(&self.slot);
        slot.value = Some(value);
        slot.available = true;
        // Notified while still holding the lock so the wakeup cannot precede the write.
        self.ready.notify_all();
    }

    /// Whether a write happened since the last blocking read
    pub fn is_available(&self) -> bool {
        lock(&self.slot).available
    }
}

impl<T: Clone> BlockingLatch<T> {
    /// Copy of the newest value without touching the availability signal
    pub fn read(&self) -> Option<T> {
        lock(&self.slot).value.clone()
    }

    /// Block until a fresh value is available and return it
    pub fn read_blocking(&self) -> T {
        let mut slot = lock(&self.slot);
        loop {
            if slot.available {
                if let Some(value) = slot.value.clone() {
                    slot.available = false;
                    return value;
                }
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`read_blocking`](Self::read_blocking) but gives up after `timeout`
    pub fn read_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = lock(&self.slot);
        loop {
            if slot.available {
                if let Some(value) = slot.value.clone() {
                    slot.available = false;
                    return Some(value);
                }
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            slot = self
                .ready
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
