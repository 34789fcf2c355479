//! Single-flight coordination of session refreshes.
//!
//! The first call that sees an expired session claims the refresh and becomes
//! its owner. Calls that fail while the owner is refreshing park a
//! [`PendingRequest`] in a FIFO queue and wait on its channel. When the owner
//! settles the cycle, the queue is drained in one step and every waiter is
//! resolved (replay) or rejected (refresh error) exactly once.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Method;
use tokio::sync::oneshot;
use tracing::debug;

use super::ApiError;

/// Outcome delivered to a parked call once the refresh settles.
pub(crate) type RefreshOutcome = Result<(), ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// A call parked while another call refreshes the session.
///
/// Holds only the descriptor of the original operation and the channel that
/// tells its caller to replay; the caller keeps its own body and config.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub method: Method,
    pub path: String,
    notify: oneshot::Sender<RefreshOutcome>,
}

#[derive(Debug)]
struct Shared {
    state: RefreshState,
    queue: VecDeque<PendingRequest>,
}

/// Refresh state plus pending queue for one client instance.
#[derive(Debug, Clone)]
pub(crate) struct RefreshCoordinator {
    shared: Arc<Mutex<Shared>>,
}

/// Result of observing an expired session.
pub(crate) enum Claim {
    /// This call performs the refresh and must settle the guard.
    Owner(RefreshGuard),
    /// A refresh is already underway; wait for its outcome.
    Queued(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: RefreshState::Idle,
                queue: VecDeque::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // The lock is never held across an await or user code, so a poisoned
        // mutex still holds consistent state.
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Atomically claim the refresh, or enqueue behind the current one.
    pub fn claim(&self, method: &Method, path: &str) -> Claim {
        let mut shared = self.lock();
        match shared.state {
            RefreshState::Idle => {
                shared.state = RefreshState::Refreshing;
                debug!(%method, path, "claimed session refresh");
                Claim::Owner(RefreshGuard {
                    coordinator: self.clone(),
                    settled: false,
                })
            }
            RefreshState::Refreshing => {
                let (notify, rx) = oneshot::channel();
                shared.queue.push_back(PendingRequest {
                    method: method.clone(),
                    path: path.to_string(),
                    notify,
                });
                debug!(%method, path, queued = shared.queue.len(), "queued behind session refresh");
                Claim::Queued(rx)
            }
        }
    }

    pub fn state(&self) -> RefreshState {
        self.lock().state
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Drain the queue and return to idle in one step, then notify the
    /// drained entries in enqueue order. Returns the released descriptors in
    /// the order they were notified.
    fn settle(&self, outcome: &RefreshOutcome) -> Vec<(Method, String)> {
        let drained: Vec<PendingRequest> = {
            let mut shared = self.lock();
            shared.state = RefreshState::Idle;
            shared.queue.drain(..).collect()
        };

        let mut released = Vec::with_capacity(drained.len());
        for pending in drained {
            debug!(method = %pending.method, path = %pending.path, ok = outcome.is_ok(), "releasing queued request");
            // A dropped receiver means the caller gave up; nothing to replay.
            let _ = pending.notify.send(outcome.clone());
            released.push((pending.method, pending.path));
        }
        released
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Ownership of the in-flight refresh.
///
/// Dropping the guard without settling (the owning call was cancelled)
/// releases every waiter with [`ApiError::RefreshAbandoned`].
pub(crate) struct RefreshGuard {
    coordinator: RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard {
    pub fn settle(mut self, outcome: &RefreshOutcome) -> Vec<(Method, String)> {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(&Err(ApiError::RefreshAbandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expired() -> ApiError {
        ApiError::Unauthorized { message: None }
    }

    #[test]
    fn test_first_claim_owns_refresh() {
        let coordinator = RefreshCoordinator::new();
        assert_eq!(coordinator.state(), RefreshState::Idle);

        let claim = coordinator.claim(&Method::GET, "/cart");
        assert!(matches!(claim, Claim::Owner(_)));
        assert_eq!(coordinator.state(), RefreshState::Refreshing);
        assert_eq!(coordinator.pending(), 0);
    }

    #[test]
    fn test_later_claims_are_queued() {
        let coordinator = RefreshCoordinator::new();
        let _owner = coordinator.claim(&Method::GET, "/cart");

        let second = coordinator.claim(&Method::POST, "/cart/items");
        let third = coordinator.claim(&Method::GET, "/orders");
        assert!(matches!(second, Claim::Queued(_)));
        assert!(matches!(third, Claim::Queued(_)));
        assert_eq!(coordinator.pending(), 2);
    }

    #[tokio::test]
    async fn test_settle_success_releases_queue_in_order() {
        let coordinator = RefreshCoordinator::new();
        let Claim::Owner(guard) = coordinator.claim(&Method::GET, "/a") else {
            panic!("expected owner");
        };

        let mut receivers = Vec::new();
        for path in ["/b", "/c", "/d"] {
            match coordinator.claim(&Method::GET, path) {
                Claim::Queued(rx) => receivers.push(rx),
                Claim::Owner(_) => panic!("second owner for {}", path),
            }
        }

        let released: Vec<String> = guard.settle(&Ok(())).into_iter().map(|(_, path)| path).collect();
        assert_eq!(released, vec!["/b", "/c", "/d"]);
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(coordinator.pending(), 0);

        for rx in receivers {
            assert!(rx.await.expect("outcome delivered").is_ok());
        }
    }

    #[tokio::test]
    async fn test_settle_failure_rejects_every_waiter() {
        let coordinator = RefreshCoordinator::new();
        let Claim::Owner(guard) = coordinator.claim(&Method::GET, "/a") else {
            panic!("expected owner");
        };
        let Claim::Queued(rx) = coordinator.claim(&Method::GET, "/b") else {
            panic!("expected queued");
        };

        let failure = Err(ApiError::RefreshFailed(Box::new(expired())));
        guard.settle(&failure);

        let outcome = rx.await.expect("outcome delivered");
        assert!(matches!(outcome, Err(ApiError::RefreshFailed(_))));
        assert_eq!(coordinator.pending(), 0);
    }

    #[tokio::test]
    async fn test_dropped_guard_abandons_waiters() {
        let coordinator = RefreshCoordinator::new();
        let owner = coordinator.claim(&Method::GET, "/a");
        let Claim::Queued(rx) = coordinator.claim(&Method::GET, "/b") else {
            panic!("expected queued");
        };

        drop(owner);

        assert!(matches!(rx.await, Ok(Err(ApiError::RefreshAbandoned))));
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[test]
    fn test_new_cycle_after_settle() {
        let coordinator = RefreshCoordinator::new();
        let Claim::Owner(guard) = coordinator.claim(&Method::GET, "/a") else {
            panic!("expected owner");
        };
        guard.settle(&Ok(()));

        // Queue stays empty until the next cycle starts
        assert_eq!(coordinator.pending(), 0);
        assert!(matches!(coordinator.claim(&Method::GET, "/a"), Claim::Owner(_)));
    }

    #[test]
    fn test_dropped_waiter_is_skipped() {
        let coordinator = RefreshCoordinator::new();
        let Claim::Owner(guard) = coordinator.claim(&Method::GET, "/a") else {
            panic!("expected owner");
        };
        drop(coordinator.claim(&Method::GET, "/b"));

        let released = guard.settle(&Ok(()));
        assert_eq!(released, vec![(Method::GET, "/b".to_string())]);
        assert_eq!(coordinator.pending(), 0);
    }
}
