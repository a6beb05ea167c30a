use std::time::Duration;

use itertools::Itertools;

use crate::error::{AggregateError, Result};
use crate::producer::Producer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Open,
    Complete,
}

/// Collects exactly one value per slot from concurrent producers and hands them back
/// in slot order, whatever order they arrived in.
pub trait OrderedAggregator<V>: Sync + Send {
    fn with_slots(slots: usize) -> Result<Self> where Self: Sized;

    fn slots(&self) -> usize;

    fn filled(&self) -> usize;

    /// Writes `value` into slot `index`. Each slot accepts one write; a second write is
    /// rejected with [`AggregateError::DuplicateSlot`] and leaves the first value in place.
    fn submit(&self, index: usize, value: V) -> Result<()>;

    /// Parks the caller until every slot is filled or `timeout` elapses. A timeout leaves
    /// the aggregator usable; late submits still count.
    fn await_complete(&self, timeout: Duration) -> Result<()>;

    fn wait(&self);

    fn collect(&self) -> Result<Vec<V>> where V: Clone;

    fn into_vec(self) -> Result<Vec<V>> where Self: Sized;

    fn is_complete(&self) -> bool {
        self.filled() == self.slots()
    }

    fn state(&self) -> AggregatorState {
        if self.is_complete() {
            AggregatorState::Complete
        } else {
            AggregatorState::Open
        }
    }

    fn producer(&self, index: usize) -> Result<Producer<'_, Self, V>> where Self: Sized {
        Producer::new(self, index)
    }

    fn producers(&self) -> Vec<Producer<'_, Self, V>> where Self: Sized {
        (0..self.slots())
            .map(|index| Producer::unchecked(self, index))
            .collect_vec()
    }
}

pub(crate) fn check_size(slots: usize) -> Result<()> {
    if slots == 0 {
        return Err(AggregateError::InvalidSize);
    }
    Ok(())
}

pub(crate) fn check_index(index: usize, slots: usize) -> Result<()> {
    if index >= slots {
        return Err(AggregateError::SlotOutOfRange { index, slots });
    }
    Ok(())
}

pub(crate) fn check_complete(filled: usize, slots: usize) -> Result<()> {
    if filled < slots {
        return Err(AggregateError::Incomplete { filled, slots });
    }
    Ok(())
}
