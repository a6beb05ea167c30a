use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use itertools::Itertools;
use tracing::{debug, trace, warn};

use common::{CompletionLatch, SyncUnsafeCell};

use crate::aggregator::{check_complete, check_index, check_size, OrderedAggregator};
use crate::error::{AggregateError, Result};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const FILLED: u8 = 2;

struct Slot<V> {
    state: AtomicU8,
    value: SyncUnsafeCell<MaybeUninit<V>>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: SyncUnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    // Only the thread that moved the state from EMPTY to WRITING may call this, once.
    unsafe fn publish(&self, value: V) {
        (*self.value.get()).write(value);
        self.state.store(FILLED, Ordering::Release);
    }

    fn get(&self) -> Option<&V> {
        if self.state.load(Ordering::Acquire) == FILLED {
            // FILLED is stored with Release after the write and never left again.
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    fn take(&mut self) -> Option<V> {
        if std::mem::replace(self.state.get_mut(), EMPTY) == FILLED {
            Some(unsafe { self.value.get_mut().assume_init_read() })
        } else {
            None
        }
    }
}

impl<V> Drop for Slot<V> {
    fn drop(&mut self) {
        if *self.state.get_mut() == FILLED {
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

/// Each slot is claimed with a compare-exchange on its own state byte, then written
/// without a lock. Only the completion signal is shared between producers.
pub struct AtomicAggregator<V> {
    slots: Vec<Slot<V>>,
    latch: CompletionLatch,
}

impl<V> AtomicAggregator<V> {
    /// The value in slot `index`, if it has been submitted and published.
    pub fn get(&self, index: usize) -> Option<&V> {
        self.slots.get(index).and_then(Slot::get)
    }
}

impl<V: Send + Sync> OrderedAggregator<V> for AtomicAggregator<V> {
    fn with_slots(slots: usize) -> Result<Self> {
        check_size(slots)?;
        debug!(slots, "creating atomic aggregator");

        Ok(Self {
            slots: (0..slots).map(|_| Slot::new()).collect_vec(),
            latch: CompletionLatch::new(slots),
        })
    }

    fn slots(&self) -> usize {
        self.slots.len()
    }

    fn filled(&self) -> usize {
        self.latch.count()
    }

    fn submit(&self, index: usize, value: V) -> Result<()> {
        if let Err(err) = check_index(index, self.slots.len()) {
            warn!(index, slots = self.slots.len(), "rejected out of range submit");
            return Err(err);
        }

        let slot = &self.slots[index];
        // A slot mid-write counts as taken too.
        if slot.state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            warn!(index, "rejected duplicate submit");
            return Err(AggregateError::DuplicateSlot { index });
        }
        unsafe { slot.publish(value) };

        let filled = self.latch.arrive();
        trace!(index, filled, "slot filled");
        if filled == self.slots.len() {
            debug!(slots = filled, "aggregation complete");
        }
        Ok(())
    }

    fn await_complete(&self, timeout: Duration) -> Result<()> {
        let filled = self.latch.wait_timeout(timeout);
        if filled < self.slots.len() {
            debug!(filled, slots = self.slots.len(), ?timeout, "timed out waiting for producers");
            return Err(AggregateError::Timeout { filled, slots: self.slots.len(), timeout });
        }
        Ok(())
    }

    fn wait(&self) {
        self.latch.wait();
    }

    fn collect(&self) -> Result<Vec<V>> where V: Clone {
        check_complete(self.latch.count(), self.slots.len())?;

        Ok(self.slots
            .iter()
            .filter_map(|slot| slot.get().cloned())
            .collect_vec())
    }

    fn into_vec(mut self) -> Result<Vec<V>> {
        check_complete(self.latch.count(), self.slots.len())?;

        Ok(self.slots
            .iter_mut()
            .filter_map(Slot::take)
            .collect_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn drops_partial_slots_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let agg = AtomicAggregator::with_slots(4).unwrap();
        agg.submit(0, DropCounter(drops.clone())).unwrap();
        agg.submit(2, DropCounter(drops.clone())).unwrap();

        // The rejected value is dropped straight away.
        assert!(agg.submit(2, DropCounter(drops.clone())).is_err());
        assert_eq!(drops.load(Ordering::Relaxed), 1);

        drop(agg);
        assert_eq!(drops.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn into_vec_moves_values_out() {
        let drops = Arc::new(AtomicUsize::new(0));
        let agg = AtomicAggregator::with_slots(3).unwrap();
        for idx in [2, 0, 1] {
            agg.submit(idx, DropCounter(drops.clone())).unwrap();
        }

        let vals = agg.into_vec().unwrap();
        assert_eq!(vals.len(), 3);
        assert_eq!(drops.load(Ordering::Relaxed), 0);

        drop(vals);
        assert_eq!(drops.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn get_skips_unpublished_slots() {
        let agg = AtomicAggregator::with_slots(2).unwrap();
        agg.submit(1, 7u64).unwrap();

        assert_eq!(agg.get(0), None);
        assert_eq!(agg.get(1), Some(&7));
    }
}
