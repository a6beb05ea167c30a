use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use itertools::Itertools;
use rand::prelude::*;
use rand_distr::{Exp, Uniform};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use ordered_aggregate::OrderedAggregator;

mod error;

pub use error::{DriverError, Result};

/// How long each simulated producer spends on its unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    /// Uniform in `[0, max_delay]`.
    Uniform,
    /// Exponential with mean `max_delay / 2`, capped at `max_delay`.
    Exponential,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub producers: usize,
    pub max_delay: Duration,
    pub latency: Latency,
    pub timeout: Duration,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            producers: 5,
            max_delay: Duration::from_millis(50),
            latency: Latency::Uniform,
            timeout: Duration::from_secs(5),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Slot indices in the order their submits landed.
    pub arrivals: Vec<usize>,
    /// Contributions in slot order.
    pub values: Vec<i64>,
    pub elapsed: Duration,
}

/// Delays are drawn with microsecond granularity.
pub fn producer_delays(producers: usize, max_delay: Duration, latency: Latency, seed: u64) -> Result<Vec<Duration>> {
    let max_us = u64::try_from(max_delay.as_micros()).unwrap_or(u64::MAX);
    if max_us == 0 {
        return Ok(vec![Duration::ZERO; producers]);
    }

    let mut rng = SmallRng::seed_from_u64(seed);
    let delays = match latency {
        Latency::Uniform => {
            let distr = Uniform::new_inclusive(0u64, max_us)
                .map_err(|e| DriverError::Latency(e.to_string()))?;
            (0..producers)
                .map(|_| distr.sample(&mut rng))
                .collect_vec()
        },
        Latency::Exponential => {
            let distr = Exp::new(2.0 / max_us as f64)
                .map_err(|e| DriverError::Latency(e.to_string()))?;
            (0..producers)
                .map(|_| (distr.sample(&mut rng) as u64).min(max_us))
                .collect_vec()
        },
    };

    Ok(delays.into_iter().map(Duration::from_micros).collect_vec())
}

/// Spawns one detached thread per slot. Producer `i` sleeps its delay, then contributes
/// `i + 1`. The calling thread waits at most `config.timeout`. Producers are never
/// cancelled: on a timeout they keep running and their late submits land in an
/// aggregator nobody reads.
pub fn run_producers<A: OrderedAggregator<i64> + 'static>(config: &RunConfig) -> Result<RunReport> {
    let aggregator = Arc::new(A::with_slots(config.producers)?);
    let delays = producer_delays(config.producers, config.max_delay, config.latency, config.seed)?;
    let arrivals = Arc::new(Mutex::new(Vec::with_capacity(config.producers)));

    let time = Instant::now();
    let handles = delays
        .into_iter()
        .enumerate()
        .map(|(idx, delay)| {
            let aggregator = Arc::clone(&aggregator);
            let arrivals = Arc::clone(&arrivals);
            thread::spawn(move || {
                thread::sleep(delay);
                match aggregator.submit(idx, idx as i64 + 1) {
                    Ok(()) => arrivals.lock().unwrap_or_else(PoisonError::into_inner).push(idx),
                    Err(err) => error!(idx, %err, "producer failed to submit"),
                }
            })
        })
        .collect_vec();

    if let Err(err) = aggregator.await_complete(config.timeout) {
        warn!(%err, "leaving outstanding producers running");
        return Err(err.into());
    }
    let elapsed = time.elapsed();

    // Every slot is filled, so each producer is past its submit.
    for (index, handle) in handles.into_iter().enumerate() {
        handle.join().map_err(|_| DriverError::ProducerPanicked { index })?;
    }

    let arrivals = std::mem::take(&mut *arrivals.lock().unwrap_or_else(PoisonError::into_inner));
    debug!(?arrivals, "producers arrived");
    let values = aggregator.collect()?;
    info!(producers = config.producers, ?elapsed, "run complete");

    Ok(RunReport { arrivals, values, elapsed })
}

/// Submits every slot from a rayon pool in a shuffled order, then checks that slot `i`
/// holds `i`.
pub fn stress_producers<A: OrderedAggregator<usize>>(
    producers: usize,
    threads: usize,
    seed: u64,
    timeout: Duration,
) -> Result<Vec<usize>> {
    let aggregator = A::with_slots(producers)?;
    let mut order = (0..producers).collect_vec();
    order.shuffle(&mut SmallRng::seed_from_u64(seed));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()?;
    pool.install(|| {
        order
            .par_iter()
            .try_for_each(|idx| aggregator.submit(*idx, *idx))
    })?;

    aggregator.await_complete(timeout)?;
    let values = aggregator.into_vec()?;
    if let Some((index, found)) = values.iter().enumerate().find(|(idx, val)| idx != *val) {
        return Err(DriverError::OutOfOrder { index, found: *found as i64, expected: index as i64 });
    }
    Ok(values)
}

/// Checks that `values` is `1..=len`, the contributions `run_producers` makes.
pub fn verify_run(values: &[i64]) -> Result<()> {
    match values.iter().enumerate().find(|(idx, val)| **val != *idx as i64 + 1) {
        Some((index, found)) => Err(DriverError::OutOfOrder { index, found: *found, expected: index as i64 + 1 }),
        None => Ok(()),
    }
}

pub fn format_joined<T: Display>(values: &[T], separator: &str) -> String {
    values.iter().join(separator)
}
