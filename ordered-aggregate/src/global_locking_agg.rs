use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use itertools::Itertools;
use tracing::{debug, trace, warn};

use crate::aggregator::{check_complete, check_index, check_size, OrderedAggregator};
use crate::error::{AggregateError, Result};

struct Slots<V> {
    values: Vec<Option<V>>,
    filled: usize,
}

/// Every submit takes one global lock. Still ordered by slot, but producers serialize.
pub struct GlobalLockingAggregator<V> {
    slots: Mutex<Slots<V>>,
    len: usize,
    done: Condvar,
}

impl<V> GlobalLockingAggregator<V> {
    // Slots are written and counted in one critical section, so a poisoned guard is
    // never half-updated.
    fn lock(&self) -> MutexGuard<'_, Slots<V>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Send + Sync> OrderedAggregator<V> for GlobalLockingAggregator<V> {
    fn with_slots(slots: usize) -> Result<Self> {
        check_size(slots)?;
        debug!(slots, "creating global locking aggregator");

        Ok(Self {
            slots: Mutex::new(Slots {
                values: (0..slots).map(|_| None).collect_vec(),
                filled: 0,
            }),
            len: slots,
            done: Condvar::new(),
        })
    }

    fn slots(&self) -> usize {
        self.len
    }

    fn filled(&self) -> usize {
        self.lock().filled
    }

    fn submit(&self, index: usize, value: V) -> Result<()> {
        if let Err(err) = check_index(index, self.len) {
            warn!(index, slots = self.len, "rejected out of range submit");
            return Err(err);
        }

        let mut slots = self.lock();
        let slot = &mut slots.values[index];
        if slot.is_some() {
            drop(slots);
            warn!(index, "rejected duplicate submit");
            return Err(AggregateError::DuplicateSlot { index });
        }
        *slot = Some(value);
        slots.filled += 1;
        let filled = slots.filled;
        drop(slots);

        trace!(index, filled, "slot filled");
        if filled == self.len {
            debug!(slots = filled, "aggregation complete");
            self.done.notify_all();
        }
        Ok(())
    }

    fn await_complete(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        let mut slots = self.lock();
        while slots.filled < self.len {
            slots = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    self.done
                        .wait_timeout(slots, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                // Overflowing deadlines are treated as "never".
                None => self.done.wait(slots).unwrap_or_else(PoisonError::into_inner),
            };
        }

        let filled = slots.filled;
        if filled < self.len {
            drop(slots);
            debug!(filled, slots = self.len, ?timeout, "timed out waiting for producers");
            return Err(AggregateError::Timeout { filled, slots: self.len, timeout });
        }
        Ok(())
    }

    fn wait(&self) {
        let slots = self.lock();
        let _slots = self.done
            .wait_while(slots, |slots| slots.filled < self.len)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn collect(&self) -> Result<Vec<V>> where V: Clone {
        let slots = self.lock();
        check_complete(slots.filled, self.len)?;

        Ok(slots.values.iter().flatten().cloned().collect_vec())
    }

    fn into_vec(self) -> Result<Vec<V>> {
        let slots = self.slots.into_inner().unwrap_or_else(PoisonError::into_inner);
        check_complete(slots.filled, self.len)?;

        Ok(slots.values.into_iter().flatten().collect_vec())
    }
}
