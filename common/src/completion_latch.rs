use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

/// Counts arrivals towards a fixed target and wakes every waiter once the target is
/// reached. Unlike a countdown latch it never blocks forever: waits take a deadline.
pub struct CompletionLatch {
    arrived: Mutex<usize>,
    target: usize,
    done: Condvar,
}

impl CompletionLatch {
    pub fn new(target: usize) -> Self {
        Self {
            arrived: Mutex::new(0),
            target,
            done: Condvar::new(),
        }
    }

    // The counter is only ever incremented under the lock, so a poisoned guard still
    // holds a consistent value.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.arrived.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one arrival. Returns the arrival count including this one.
    pub fn arrive(&self) -> usize {
        let mut arrived = self.lock();
        *arrived += 1;
        let count = *arrived;
        drop(arrived);

        if count == self.target {
            trace!(target = self.target, "completion latch opened");
            self.done.notify_all();
        }
        count
    }

    pub fn count(&self) -> usize {
        *self.lock()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn is_open(&self) -> bool {
        self.count() >= self.target
    }

    /// Blocks until the target is reached or `timeout` has elapsed. Returns the
    /// arrival count observed last, so `count >= target` means the latch opened.
    pub fn wait_timeout(&self, timeout: Duration) -> usize {
        // Overflowing deadlines are treated as "never".
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };

        let mut arrived = self.lock();
        while *arrived < self.target {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            arrived = self
                .done
                .wait_timeout(arrived, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *arrived
    }

    /// Blocks until the target is reached.
    pub fn wait(&self) -> usize {
        let arrived = self.lock();
        let arrived = self
            .done
            .wait_while(arrived, |arrived| *arrived < self.target)
            .unwrap_or_else(PoisonError::into_inner);
        *arrived
    }
}
