//! Restoration coordinator.
//!
//! Restored transactions flow through the transaction processor like any
//! other batch; this only tracks the outcome of the restore request itself.

use std::sync::Arc;

use tracing::{info, warn};

use entitlekit_entitlements::RestorationStatus;
use entitlekit_events::StatusCell;

use crate::ports::PaymentQueue;

pub struct RestorationCoordinator {
    queue: Arc<dyn PaymentQueue>,
    status: Arc<StatusCell<RestorationStatus>>,
}

impl RestorationCoordinator {
    pub fn new(queue: Arc<dyn PaymentQueue>, status: Arc<StatusCell<RestorationStatus>>) -> Self {
        Self { queue, status }
    }

    /// Publish `Loading` and ask the backend to re-deliver completed transactions.
    pub fn restore(&self) {
        self.status.set(RestorationStatus::Loading);
        info!("restoring completed transactions");

        if let Err(err) = self.queue.restore_completed_transactions() {
            self.failed(err.to_string());
        }
    }

    pub fn finished(&self) {
        info!("restoration finished");
        self.status.set(RestorationStatus::Finished);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "restoration failed");
        self.status.set(RestorationStatus::Failed { reason });
    }
}

impl core::fmt::Debug for RestorationCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RestorationCoordinator")
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryPaymentQueue;
    use crate::ports::BackendError;

    #[test]
    fn restore_then_finish() {
        let queue = Arc::new(InMemoryPaymentQueue::new());
        let status = Arc::new(StatusCell::new(RestorationStatus::Idle));
        let sub = status.subscribe_changes();
        let coordinator = RestorationCoordinator::new(queue.clone(), status.clone());

        coordinator.restore();
        coordinator.finished();

        assert_eq!(queue.restore_requests(), 1);
        assert_eq!(
            sub.drain(),
            vec![RestorationStatus::Loading, RestorationStatus::Finished]
        );
    }

    #[test]
    fn backend_refusal_fails_immediately() {
        let queue = Arc::new(InMemoryPaymentQueue::new());
        queue.fail_with(Some(BackendError::Rejected("not signed in".into())));
        let status = Arc::new(StatusCell::new(RestorationStatus::Idle));
        let coordinator = RestorationCoordinator::new(queue, status.clone());

        coordinator.restore();

        assert_eq!(
            status.get(),
            RestorationStatus::Failed {
                reason: "purchase backend rejected the request: not signed in".to_string()
            }
        );
    }
}
