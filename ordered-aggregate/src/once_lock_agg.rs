use std::sync::OnceLock;
use std::time::Duration;

use itertools::Itertools;
use tracing::{debug, trace, warn};

use common::CompletionLatch;

use crate::aggregator::{check_complete, check_index, check_size, OrderedAggregator};
use crate::error::{AggregateError, Result};

/// Slots are write-once `OnceLock`s, so slot writes never contend with each other. Only
/// the filled count and the completion signal sit behind a lock.
pub struct OnceLockAggregator<V> {
    slots: Vec<OnceLock<V>>,
    latch: CompletionLatch,
}

impl<V> OnceLockAggregator<V> {
    /// The value in slot `index`, if it has been submitted.
    pub fn get(&self, index: usize) -> Option<&V> {
        self.slots.get(index).and_then(OnceLock::get)
    }
}

impl<V: Send + Sync> OrderedAggregator<V> for OnceLockAggregator<V> {
    fn with_slots(slots: usize) -> Result<Self> {
        check_size(slots)?;
        debug!(slots, "creating once-lock aggregator");

        Ok(Self {
            slots: (0..slots).map(|_| OnceLock::new()).collect_vec(),
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

        // `set` hands the value back when the slot is taken; the first write stays.
        if self.slots[index].set(value).is_err() {
            warn!(index, "rejected duplicate submit");
            return Err(AggregateError::DuplicateSlot { index });
        }

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

        // Every slot was set before its arrival was counted.
        Ok(self.slots
            .iter()
            .filter_map(|slot| slot.get().cloned())
            .collect_vec())
    }

    fn into_vec(self) -> Result<Vec<V>> {
        check_complete(self.latch.count(), self.slots.len())?;

        Ok(self.slots
            .into_iter()
            .filter_map(OnceLock::into_inner)
            .collect_vec())
    }
}
