//! Counting admission gate bounding in-flight requests across all sources.
//!
//! # Concurrency Model
//!
//! - A permit is acquired before each request is issued
//! - Waiters suspend without blocking other tasks
//! - Permits are released when the [`GatePermit`] is dropped (RAII), which
//!   covers success, error, and cancellation of the holding future
//! - Tokio's semaphore queues waiters in FIFO order, so no waiter starves

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, trace};

/// Minimum allowed permit count.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed permit count.
pub const MAX_CONCURRENCY: usize = 100;

/// Default permit count if not configured.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Errors from gate construction and admission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    /// Invalid permit count provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The gate was closed while waiting.
    #[error("concurrency gate closed")]
    Closed,
}

/// Shared concurrency budget. Clones share the same permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
}

/// Proof of admission; the permit returns to the gate on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Creates a gate admitting at most `max_permits` concurrent holders.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidConcurrency`] outside `1..=100`.
    #[instrument(level = "debug")]
    pub fn new(max_permits: usize) -> Result<Self, GateError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&max_permits) {
            return Err(GateError::InvalidConcurrency { value: max_permits });
        }
        debug!(max_permits, "creating concurrency gate");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_permits)),
            max_permits,
        })
    }

    /// Returns the configured permit count.
    #[must_use]
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Returns the number of permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free permit.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Closed`] if the gate was closed.
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateError::Closed)?;
        trace!(available = self.available(), "gate permit acquired");
        Ok(GatePermit { _permit: permit })
    }

    /// Runs `fut` while holding a permit.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Closed`] if the gate was closed before admission.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, GateError>
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(fut.await)
    }

    /// Closes the gate; current and future waiters fail with [`GateError::Closed`].
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::future::join_all;

    use super::*;

    #[test]
    fn test_gate_new_valid_concurrency() {
        assert_eq!(ConcurrencyGate::new(1).unwrap().max_permits(), 1);
        assert_eq!(ConcurrencyGate::new(100).unwrap().max_permits(), 100);
    }

    #[test]
    fn test_gate_new_invalid_concurrency() {
        assert_eq!(
            ConcurrencyGate::new(0).unwrap_err(),
            GateError::InvalidConcurrency { value: 0 }
        );
        assert_eq!(
            ConcurrencyGate::new(101).unwrap_err(),
            GateError::InvalidConcurrency { value: 101 }
        );
    }

    #[test]
    fn test_gate_error_display() {
        let msg = GateError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let gate = ConcurrencyGate::new(2).unwrap();
        let permit = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 1);
        drop(permit);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_run_bounds_in_flight_work() {
        let gate = ConcurrencyGate::new(3).unwrap();
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let tasks = (0..12).map(|_| {
            gate.run(async {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
        });
        let results = join_all(tasks).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn test_permit_released_on_cancellation() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.run(tokio::time::sleep(Duration::from_secs(60)));

        // Dropping the future mid-flight must hand the permit back.
        let timed_out = tokio::time::timeout(Duration::from_millis(10), held).await;
        assert!(timed_out.is_err());
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_permit_released_on_error() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let result: Result<Result<(), &str>, GateError> = gate.run(async { Err("boom") }).await;
        assert_eq!(result.unwrap(), Err("boom"));
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_waiters_all_eventually_acquire() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let order = std::sync::Mutex::new(Vec::new());

        let tasks = (0..5).map(|i| {
            let gate = gate.clone();
            let order = &order;
            async move {
                gate.run(async {
                    tokio::task::yield_now().await;
                    order.lock().unwrap().push(i);
                })
                .await
            }
        });
        join_all(tasks).await;

        assert_eq!(order.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_closed_gate_rejects_acquire() {
        let gate = ConcurrencyGate::new(1).unwrap();
        gate.close();
        assert_eq!(gate.acquire().await.unwrap_err(), GateError::Closed);
    }
}
