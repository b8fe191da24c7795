// Licensed under the Apache-2.0 license

//! Synchronization state shared between thread context and interrupt handlers.
//!
//! Each open controller owns one [`AdapterSlot`] taken from a caller-supplied
//! pool. The slot carries the bus lock that serializes transfers and the
//! counting signal through which the interrupt handlers wake the transfer
//! engine.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Counting semaphore posted from interrupt context and consumed by the
/// transfer engine.
///
/// `up` never blocks and never fails, so it is safe to call from any handler.
/// Posts are counted, which means an event raised before the engine starts
/// waiting is not lost.
#[derive(Debug, Default)]
pub struct CountingSignal {
    count: AtomicUsize,
}

impl CountingSignal {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
        }
    }

    /// Post one event.
    pub fn up(&self) {
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Consume one event if any is pending.
    pub fn try_take(&self) -> bool {
        self.count
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Number of events posted and not yet consumed.
    pub fn pending(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Drop all pending events.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }
}

/// Per-controller synchronization state, allocated while the controller is open.
#[derive(Debug, Default)]
pub struct AdapterSlot {
    claimed: AtomicBool,
    bus_lock: spin::Mutex<()>,
    signal: CountingSignal,
}

impl AdapterSlot {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            bus_lock: spin::Mutex::new(()),
            signal: CountingSignal::new(),
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    pub(crate) fn bus_lock(&self) -> &spin::Mutex<()> {
        &self.bus_lock
    }

    pub(crate) fn signal(&self) -> &CountingSignal {
        &self.signal
    }

    fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.claimed.store(false, Ordering::Release);
    }
}

/// Claim the first free slot of `pool` and return its index.
///
/// The claimed slot starts with no pending events.
pub(crate) fn claim(pool: &[AdapterSlot]) -> Option<usize> {
    let index = pool.iter().position(AdapterSlot::try_claim)?;
    if let Some(slot) = pool.get(index) {
        slot.signal.reset();
    }
    Some(index)
}

pub(crate) fn release(pool: &[AdapterSlot], index: usize) {
    if let Some(slot) = pool.get(index) {
        slot.signal.reset();
        slot.release();
    }
}
