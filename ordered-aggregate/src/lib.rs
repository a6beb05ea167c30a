mod aggregator;
mod error;
mod producer;
pub mod atomic_agg;
pub mod global_locking_agg;
pub mod once_lock_agg;

pub use aggregator::{AggregatorState, OrderedAggregator};
pub use atomic_agg::AtomicAggregator;
pub use error::{AggregateError, Result};
pub use global_locking_agg::GlobalLockingAggregator;
pub use once_lock_agg::OnceLockAggregator;
pub use producer::Producer;
