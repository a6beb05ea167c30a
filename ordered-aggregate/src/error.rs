use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("aggregator needs at least one slot")]
    InvalidSize,
    #[error("slot {index} is out of range for {slots} slots")]
    SlotOutOfRange { index: usize, slots: usize },
    #[error("slot {index} was already submitted")]
    DuplicateSlot { index: usize },
    #[error("timed out after {timeout:?} with {filled}/{slots} slots filled")]
    Timeout { filled: usize, slots: usize, timeout: Duration },
    #[error("aggregation incomplete: {filled}/{slots} slots filled")]
    Incomplete { filled: usize, slots: usize },
}

impl AggregateError {
    /// Timeouts are the only recoverable failure: the caller may wait again.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AggregateError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, AggregateError>;
