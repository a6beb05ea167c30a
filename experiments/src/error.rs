use ordered_aggregate::AggregateError;
use rayon::ThreadPoolBuildError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("invalid latency distribution: {0}")]
    Latency(String),
    #[error("could not build producer pool: {0}")]
    Pool(#[from] ThreadPoolBuildError),
    #[error("producer {index} panicked")]
    ProducerPanicked { index: usize },
    #[error("slot {index} holds {found}, expected {expected}")]
    OutOfOrder { index: usize, found: i64, expected: i64 },
}

pub type Result<T> = std::result::Result<T, DriverError>;
