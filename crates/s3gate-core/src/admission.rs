//! Request admission control.
//!
//! Two disciplines:
//!
//! - **Fail-fast counters**, one per [`OperationClass`] plus a global one.
//!   Entering increments the counter and hands back an [`AdmissionGuard`]
//!   that decrements it on drop. If the incremented value exceeds the
//!   ceiling the request is rejected at once with `SlowDown`.
//! - **Upload pool**, a semaphore sized like the write ceiling that gates
//!   the synchronous small-object path. Waiting is bounded by the object
//!   timeout; on expiry the request fails with `RequestTimeout`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use s3gate_model::OperationClass;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};

/// One in-flight counter with a ceiling.
#[derive(Debug)]
struct Counter {
    name: &'static str,
    active: AtomicUsize,
    limit: usize,
}

impl Counter {
    fn new(name: &'static str, limit: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            active: AtomicUsize::new(0),
            limit,
        })
    }
}

/// Holds one slot of a fail-fast counter until dropped.
#[derive(Debug)]
pub struct AdmissionGuard {
    counter: Arc<Counter>,
}

impl AdmissionGuard {
    fn enter(counter: &Arc<Counter>) -> (Self, usize) {
        let count = counter.active.fetch_add(1, Ordering::AcqRel) + 1;
        (
            Self {
                counter: Arc::clone(counter),
            },
            count,
        )
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.counter.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Process-wide admission state, shared by every request.
#[derive(Debug)]
pub struct AdmissionController {
    global: Arc<Counter>,
    list: Arc<Counter>,
    read: Arc<Counter>,
    write: Arc<Counter>,
    upload_pool: Arc<Semaphore>,
    pool_timeout: Duration,
}

impl AdmissionController {
    /// Build the controller from the configured ceilings.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            global: Counter::new("global", config.max_request_num),
            list: Counter::new(OperationClass::List.as_str(), config.max_list_num),
            read: Counter::new(OperationClass::Read.as_str(), config.max_get_obj_num),
            write: Counter::new(OperationClass::Write.as_str(), config.max_create_obj_num),
            upload_pool: Arc::new(Semaphore::new(config.max_create_obj_num)),
            pool_timeout: Duration::from_secs(config.object_timeout_secs),
        }
    }

    /// Count a request against the global ceiling.
    ///
    /// # Errors
    ///
    /// [`GatewayError::SlowDown`] when the ceiling is exceeded.
    pub fn enter_global(&self) -> GatewayResult<AdmissionGuard> {
        Self::admit(&self.global)
    }

    /// Count a request against its class ceiling. Requests of
    /// [`OperationClass::Other`] are not limited and get no guard.
    ///
    /// # Errors
    ///
    /// [`GatewayError::SlowDown`] when the ceiling is exceeded.
    pub fn enter(&self, class: OperationClass) -> GatewayResult<Option<AdmissionGuard>> {
        match self.counter(class) {
            Some(counter) => Self::admit(counter).map(Some),
            None => Ok(None),
        }
    }

    /// Wait for a small-upload token, up to the configured timeout.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RequestTimeout`] when no token frees up in time.
    pub async fn acquire_upload_slot(&self) -> GatewayResult<OwnedSemaphorePermit> {
        let acquire = Arc::clone(&self.upload_pool).acquire_owned();
        match tokio::time::timeout(self.pool_timeout, acquire).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(closed)) => Err(GatewayError::Internal(closed.into())),
            Err(_) => {
                warn!(
                    timeout_secs = self.pool_timeout.as_secs(),
                    "timed out waiting for an upload slot"
                );
                Err(GatewayError::RequestTimeout {
                    seconds: self.pool_timeout.as_secs(),
                })
            }
        }
    }

    /// Requests of `class` currently in flight.
    #[must_use]
    pub fn in_flight(&self, class: OperationClass) -> usize {
        self.counter(class)
            .map_or(0, |c| c.active.load(Ordering::Acquire))
    }

    /// Requests currently counted against the global ceiling.
    #[must_use]
    pub fn global_in_flight(&self) -> usize {
        self.global.active.load(Ordering::Acquire)
    }

    /// Tokens currently free in the upload pool.
    #[must_use]
    pub fn available_upload_slots(&self) -> usize {
        self.upload_pool.available_permits()
    }

    fn counter(&self, class: OperationClass) -> Option<&Arc<Counter>> {
        match class {
            OperationClass::List => Some(&self.list),
            OperationClass::Read => Some(&self.read),
            OperationClass::Write => Some(&self.write),
            OperationClass::Other => None,
        }
    }

    fn admit(counter: &Arc<Counter>) -> GatewayResult<AdmissionGuard> {
        let (guard, count) = AdmissionGuard::enter(counter);
        if count > counter.limit {
            warn!(
                class = counter.name,
                count,
                limit = counter.limit,
                "request rejected by admission control"
            );
            drop(guard);
            return Err(GatewayError::SlowDown {
                class: counter.name,
                count,
                limit: counter.limit,
            });
        }
        Ok(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(list: usize, timeout_secs: u64) -> AdmissionController {
        let config = GatewayConfig::builder()
            .max_list_num(list)
            .max_create_obj_num(1)
            .object_timeout_secs(timeout_secs)
            .build();
        AdmissionController::new(&config)
    }

    #[test]
    fn test_should_shed_excess_list_requests() {
        let admission = controller(2, 1);
        let first = admission.enter(OperationClass::List).unwrap();
        let second = admission.enter(OperationClass::List).unwrap();

        let err = admission.enter(OperationClass::List).unwrap_err();
        assert!(matches!(err, GatewayError::SlowDown { count: 3, limit: 2, .. }));
        assert!(err.is_retryable());
        assert_eq!(admission.in_flight(OperationClass::List), 2);

        drop(first);
        drop(second);
        assert_eq!(admission.in_flight(OperationClass::List), 0);
    }

    #[test]
    fn test_should_not_limit_other_class() {
        let admission = controller(1, 1);
        for _ in 0..10 {
            assert!(admission.enter(OperationClass::Other).unwrap().is_none());
        }
        assert_eq!(admission.in_flight(OperationClass::Other), 0);
    }

    #[test]
    fn test_should_release_slot_when_request_fails() {
        let admission = controller(1, 1);
        let outcome: GatewayResult<()> = (|| {
            let _guard = admission.enter(OperationClass::List)?;
            Err(GatewayError::InvalidRange)
        })();
        assert!(outcome.is_err());
        assert_eq!(admission.in_flight(OperationClass::List), 0);
        assert!(admission.enter(OperationClass::List).is_ok());
    }

    #[tokio::test]
    async fn test_should_shed_concurrent_tasks_and_return_to_baseline() {
        let admission = Arc::new(controller(2, 1));
        let attempted = Arc::new(AtomicUsize::new(0));
        let (release_tx, _) = tokio::sync::broadcast::channel::<()>(1);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let admission = Arc::clone(&admission);
            let attempted = Arc::clone(&attempted);
            let mut release = release_tx.subscribe();
            handles.push(tokio::spawn(async move {
                let entered = admission.enter(OperationClass::List);
                attempted.fetch_add(1, Ordering::SeqCst);
                let guard = entered?;
                let _ = release.recv().await;
                drop(guard);
                Ok::<_, GatewayError>(())
            }));
        }
        while attempted.load(Ordering::SeqCst) < 5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(admission.in_flight(OperationClass::List), 2);
        release_tx.send(()).unwrap();

        let mut rejected = 0;
        for handle in handles {
            if let Err(err) = handle.await.unwrap() {
                assert!(err.is_retryable());
                rejected += 1;
            }
        }
        assert_eq!(rejected, 3);
        assert_eq!(admission.in_flight(OperationClass::List), 0);
    }

    #[tokio::test]
    async fn test_should_time_out_waiting_for_upload_slot() {
        let admission = controller(2, 0);
        let held = admission.acquire_upload_slot().await.unwrap();
        assert_eq!(admission.available_upload_slots(), 0);

        let err = admission.acquire_upload_slot().await.unwrap_err();
        assert!(matches!(err, GatewayError::RequestTimeout { seconds: 0 }));
        assert!(err.is_retryable());

        drop(held);
        assert!(admission.acquire_upload_slot().await.is_ok());
    }

    #[test]
    fn test_should_apply_global_ceiling() {
        let config = GatewayConfig::builder().max_request_num(1).build();
        let admission = AdmissionController::new(&config);
        let guard = admission.enter_global().unwrap();
        assert!(admission.enter_global().is_err());
        drop(guard);
        assert_eq!(admission.global_in_flight(), 0);
    }
}
