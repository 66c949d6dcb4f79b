// counter.rs — Per-marble-type activation slots
//
// One counter per marble type, created with the manifest snapshot and never
// shared between types. A slot is taken with a single compare-and-swap that
// checks the limit, and is handed out as a `Reservation`. Dropping a
// reservation without committing it gives the slot back, so a rejected quote,
// a failed signature or a panic mid-activation never consumes capacity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Slot accounting for one marble type.
#[derive(Debug, Default)]
pub struct ActivationCounter {
    /// Committed plus in-flight activations; the limit is checked against this.
    reserved: AtomicU64,
    /// Activations that produced a certificate.
    committed: AtomicU64,
}

impl ActivationCounter {
    /// Take one slot unless `limit` slots are already reserved.
    pub fn try_reserve(&self, limit: Option<u64>) -> Option<Reservation<'_>> {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match limit {
                Some(limit) if n >= limit => None,
                _ => n.checked_add(1),
            })
            .ok()
            .map(|_| Reservation {
                counter: self,
                committed: false,
            })
    }

    /// Number of successful activations so far.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Acquire)
    }
}

/// A provisionally taken slot.
#[must_use = "an uncommitted reservation is released on drop"]
pub struct Reservation<'a> {
    counter: &'a ActivationCounter,
    committed: bool,
}

impl Reservation<'_> {
    /// Keep the slot. Returns the number of committed activations including
    /// this one.
    pub fn commit(mut self) -> u64 {
        self.committed = true;
        self.counter.committed.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.counter.reserved.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Counters for every marble type in a manifest. The key set is fixed at
/// construction, so lookups never lock.
#[derive(Debug, Default)]
pub struct ActivationCounters {
    counters: HashMap<String, ActivationCounter>,
}

impl ActivationCounters {
    pub fn new<'a>(marble_types: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            counters: marble_types
                .into_iter()
                .map(|name| (name.clone(), ActivationCounter::default()))
                .collect(),
        }
    }

    pub fn get(&self, marble_type: &str) -> Option<&ActivationCounter> {
        self.counters.get(marble_type)
    }
}
