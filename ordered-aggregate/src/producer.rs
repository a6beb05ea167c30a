use std::fmt;
use std::marker::PhantomData;

use crate::aggregator::{check_index, OrderedAggregator};
use crate::error::Result;

/// A producer's claim on one slot. Submitting consumes the handle, so a single handle
/// can never write twice.
pub struct Producer<'a, A: ?Sized, V> {
    aggregator: &'a A,
    index: usize,
    pd: PhantomData<fn(V)>,
}

impl<'a, A: OrderedAggregator<V> + ?Sized, V> Producer<'a, A, V> {
    pub fn new(aggregator: &'a A, index: usize) -> Result<Self> {
        check_index(index, aggregator.slots())?;
        Ok(Self::unchecked(aggregator, index))
    }

    // Caller guarantees `index < aggregator.slots()`.
    pub(crate) fn unchecked(aggregator: &'a A, index: usize) -> Self {
        Self {
            aggregator,
            index,
            pd: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn submit(self, value: V) -> Result<()> {
        self.aggregator.submit(self.index, value)
    }
}

impl<A: ?Sized, V> fmt::Debug for Producer<'_, A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("index", &self.index).finish()
    }
}
