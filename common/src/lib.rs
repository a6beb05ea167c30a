mod completion_latch;
mod sync_unsafe_cell;

pub use completion_latch::CompletionLatch;
pub use sync_unsafe_cell::SyncUnsafeCell;
