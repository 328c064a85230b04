//! Transaction event processor.
//!
//! Consumes one batch of payment-queue updates at a time:
//! - filters to the two known products (others stay unacknowledged)
//! - runs each update through the per-transaction state machine
//! - publishes a `TransactionStatus` for every accepted update
//! - acknowledges terminal transactions exactly once
//! - finally re-reads the purchase record and republishes the entitlement

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use entitlekit_core::TransactionId;
use entitlekit_entitlements::{
    EntitlementStatus, PaymentTransaction, PendingTransaction, TransactionStatus,
};
use entitlekit_events::{StatusCell, execute};

use crate::ports::{Clock, PaymentQueue};
use crate::receipt_reader::PurchaseRecordReader;

/// Summary of one processed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    /// Transactions acknowledged with the backend, in order.
    pub acknowledged: Vec<TransactionId>,
    /// Terminal transactions whose acknowledgment call failed.
    pub acknowledgment_failures: Vec<TransactionId>,
    /// Updates for products this system does not handle.
    pub skipped: Vec<TransactionId>,
    /// Updates refused by the state machine (duplicates, illegal transitions).
    pub rejected: Vec<TransactionId>,
    /// Entitlement published after the batch.
    pub entitlement: EntitlementStatus,
}

pub struct TransactionProcessor {
    reader: Arc<PurchaseRecordReader>,
    queue: Arc<dyn PaymentQueue>,
    clock: Arc<dyn Clock>,
    transaction_status: Arc<StatusCell<TransactionStatus>>,
    entitlement_status: Arc<StatusCell<EntitlementStatus>>,
    // Non-terminal transactions carried across batches (e.g. Deferred).
    pending: Mutex<HashMap<TransactionId, PendingTransaction>>,
}

impl TransactionProcessor {
    pub fn new(
        reader: Arc<PurchaseRecordReader>,
        queue: Arc<dyn PaymentQueue>,
        clock: Arc<dyn Clock>,
        transaction_status: Arc<StatusCell<TransactionStatus>>,
        entitlement_status: Arc<StatusCell<EntitlementStatus>>,
    ) -> Self {
        Self {
            reader,
            queue,
            clock,
            transaction_status,
            entitlement_status,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Transactions seen but not yet finalized.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn process_batch(&self, batch: &[PaymentTransaction]) -> BatchOutcome {
        let batch_id = Uuid::now_v7();
        let span = info_span!("transaction_batch", %batch_id, size = batch.len());
        let _enter = span.enter();

        let mut outcome = BatchOutcome {
            batch_id,
            acknowledged: Vec::new(),
            acknowledgment_failures: Vec::new(),
            skipped: Vec::new(),
            rejected: Vec::new(),
            entitlement: EntitlementStatus::NoPurchase,
        };

        {
            // Holding the map for the whole batch keeps concurrent batches from
            // interleaving transitions of the same transaction.
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let ids = self.reader.product_ids();
            let now = self.clock.now();

            for tx in batch {
                if ids.classify(&tx.product_id).is_none() {
                    debug!(transaction_id = %tx.id, product = %tx.product_id, "ignoring transaction for unknown product");
                    outcome.skipped.push(tx.id.clone());
                    continue;
                }

                let aggregate = pending.entry(tx.id.clone()).or_insert_with(|| {
                    PendingTransaction::empty(tx.id.clone(), tx.product_id.clone())
                });

                let events = match execute(aggregate, &tx.update(now)) {
                    Ok(events) => events,
                    Err(err) => {
                        warn!(transaction_id = %tx.id, state = tx.state.as_str(), error = %err, "transaction update rejected");
                        outcome.rejected.push(tx.id.clone());
                        continue;
                    }
                };

                for event in events {
                    info!(transaction_id = %tx.id, product = %tx.product_id, state = event.state.as_str(), "transaction updated");
                    self.transaction_status.set(event.status());

                    if event.requires_acknowledgment() {
                        match self.queue.finish_transaction(&tx.id) {
                            Ok(()) => outcome.acknowledged.push(tx.id.clone()),
                            Err(err) => {
                                warn!(transaction_id = %tx.id, error = %err, "failed to acknowledge transaction");
                                outcome.acknowledgment_failures.push(tx.id.clone());
                            }
                        }
                    }
                }
            }

            // A redelivery after this batch is the backend's call; start fresh for it.
            pending.retain(|_, tx| !tx.is_finalized());
        }

        outcome.entitlement = self.reader.refresh_into(&self.entitlement_status);
        info!(
            acknowledged = outcome.acknowledged.len(),
            skipped = outcome.skipped.len(),
            rejected = outcome.rejected.len(),
            entitlement = ?outcome.entitlement,
            "transaction batch processed"
        );
        outcome
    }
}

impl core::fmt::Debug for TransactionProcessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransactionProcessor")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{FixedClock, InMemoryPaymentQueue, StaticReceiptStore};
    use crate::receipt_reader::JsonReceiptDecoder;
    use chrono::{TimeZone, Utc};
    use entitlekit_entitlements::{ProductIds, TransactionState};

    struct Fixture {
        processor: TransactionProcessor,
        queue: Arc<InMemoryPaymentQueue>,
        transaction_status: Arc<StatusCell<TransactionStatus>>,
        entitlement_status: Arc<StatusCell<EntitlementStatus>>,
        record: tempfile::NamedTempFile,
    }

    impl Fixture {
        fn write_record(&self, json: &str) {
            std::fs::write(self.record.path(), json).unwrap();
        }
    }

    fn fixture() -> Fixture {
        let record = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(record.path(), r#"{"in_app":[]}"#).unwrap();

        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()));
        let reader = Arc::new(PurchaseRecordReader::new(
            ProductIds::default(),
            None,
            Arc::new(StaticReceiptStore::new(Some(record.path().to_path_buf()))),
            Arc::new(JsonReceiptDecoder),
            clock.clone(),
        ));
        let queue = Arc::new(InMemoryPaymentQueue::new());
        let transaction_status = Arc::new(StatusCell::new(TransactionStatus::Idle));
        let entitlement_status = Arc::new(StatusCell::new(EntitlementStatus::NoPurchase));

        let processor = TransactionProcessor::new(
            reader,
            queue.clone(),
            clock,
            transaction_status.clone(),
            entitlement_status.clone(),
        );

        Fixture {
            processor,
            queue,
            transaction_status,
            entitlement_status,
            record,
        }
    }

    fn tx(id: &str, product: &str, state: TransactionState) -> PaymentTransaction {
        PaymentTransaction::new(id, product, state)
    }

    #[test]
    fn purchased_unlock_is_acknowledged_and_entitles() {
        let f = fixture();
        let entitlements = f.entitlement_status.subscribe_changes();
        f.write_record(r#"{"in_app":[{"product_id":"pro_version"}]}"#);

        let outcome = f.processor.process_batch(&[
            tx("1", "pro_version", TransactionState::Purchasing),
            tx("1", "pro_version", TransactionState::Purchased),
        ]);

        assert_eq!(outcome.acknowledged, vec![TransactionId::new("1")]);
        assert_eq!(f.queue.finished(), vec![TransactionId::new("1")]);
        assert_eq!(f.transaction_status.get(), TransactionStatus::Purchased);
        assert_eq!(entitlements.drain(), vec![EntitlementStatus::ProUnlocked]);
    }

    #[test]
    fn failed_transaction_is_acknowledged_once() {
        let f = fixture();
        let statuses = f.transaction_status.subscribe_changes();

        f.processor.process_batch(&[
            tx("7", "pro_subscription", TransactionState::Failed).with_error("card declined"),
        ]);

        assert_eq!(f.queue.finished(), vec![TransactionId::new("7")]);
        assert_eq!(
            statuses.drain(),
            vec![TransactionStatus::Failed {
                reason: Some("card declined".to_string())
            }]
        );
    }

    #[test]
    fn deferred_transaction_waits_for_a_later_batch() {
        let f = fixture();

        let first = f.processor.process_batch(&[tx("9", "pro_version", TransactionState::Deferred)]);
        assert!(first.acknowledged.is_empty());
        assert!(f.queue.finished().is_empty());
        assert_eq!(f.transaction_status.get(), TransactionStatus::Deferred);
        assert_eq!(f.processor.pending_count(), 1);

        f.write_record(r#"{"in_app":[{"product_id":"pro_version"}]}"#);
        let second = f.processor.process_batch(&[tx("9", "pro_version", TransactionState::Purchased)]);

        assert_eq!(second.acknowledged, vec![TransactionId::new("9")]);
        assert_eq!(second.entitlement, EntitlementStatus::ProUnlocked);
        assert_eq!(f.processor.pending_count(), 0);
    }

    #[test]
    fn duplicate_terminal_update_in_one_batch_is_not_acknowledged_twice() {
        let f = fixture();

        let outcome = f.processor.process_batch(&[
            tx("3", "pro_version", TransactionState::Purchased),
            tx("3", "pro_version", TransactionState::Purchased),
        ]);

        assert_eq!(f.queue.finished(), vec![TransactionId::new("3")]);
        assert_eq!(outcome.rejected, vec![TransactionId::new("3")]);
    }

    #[test]
    fn unknown_products_are_left_unacknowledged() {
        let f = fixture();
        let statuses = f.transaction_status.subscribe_changes();

        let outcome = f.processor.process_batch(&[tx("5", "coins_pack_100", TransactionState::Purchased)]);

        assert_eq!(outcome.skipped, vec![TransactionId::new("5")]);
        assert!(f.queue.finished().is_empty());
        assert!(statuses.drain().is_empty());
    }

    #[test]
    fn entitlement_is_republished_after_irrelevant_batches() {
        let f = fixture();
        let entitlements = f.entitlement_status.subscribe_changes();
        // Changed out of band, no relevant transaction in the batch.
        f.write_record(
            r#"{"in_app":[{"product_id":"pro_subscription","expires_date":"2026-03-01T00:00:00Z"}]}"#,
        );

        f.processor.process_batch(&[]);

        assert_eq!(
            entitlements.drain(),
            vec![EntitlementStatus::ActiveSubscription {
                expires_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
            }]
        );
    }

    #[test]
    fn acknowledgment_failures_are_reported() {
        let f = fixture();
        f.queue
            .fail_with(Some(crate::ports::BackendError::Unavailable("offline".into())));

        let outcome = f.processor.process_batch(&[tx("11", "pro_version", TransactionState::Restored)]);

        assert!(outcome.acknowledged.is_empty());
        assert_eq!(outcome.acknowledgment_failures, vec![TransactionId::new("11")]);
        assert_eq!(f.transaction_status.get(), TransactionStatus::Purchased);
    }
}
