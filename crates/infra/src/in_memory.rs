//! In-memory collaborators for tests, demos and the CLI.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use entitlekit_core::{ProductId, TransactionId};
use entitlekit_entitlements::StoreProduct;

use crate::ports::{BackendError, Clock, PaymentQueue, ProductCatalog, ReceiptStore, TelemetrySink};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct QueueLog {
    submitted: Vec<ProductId>,
    finished: Vec<TransactionId>,
    restore_requests: usize,
    fail_with: Option<BackendError>,
}

/// Payment queue that records every call.
///
/// Completions are not generated here; tests publish the matching
/// notifications themselves.
#[derive(Debug, Default)]
pub struct InMemoryPaymentQueue {
    log: Mutex<QueueLog>,
}

impl InMemoryPaymentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `error` (or succeed again with `None`).
    pub fn fail_with(&self, error: Option<BackendError>) {
        lock(&self.log).fail_with = error;
    }

    pub fn submitted(&self) -> Vec<ProductId> {
        lock(&self.log).submitted.clone()
    }

    /// Acknowledged transactions, in call order.
    pub fn finished(&self) -> Vec<TransactionId> {
        lock(&self.log).finished.clone()
    }

    pub fn restore_requests(&self) -> usize {
        lock(&self.log).restore_requests
    }
}

impl PaymentQueue for InMemoryPaymentQueue {
    fn submit(&self, product: &StoreProduct) -> Result<(), BackendError> {
        let mut log = lock(&self.log);
        if let Some(err) = log.fail_with.clone() {
            return Err(err);
        }
        log.submitted.push(product.product_id.clone());
        Ok(())
    }

    fn restore_completed_transactions(&self) -> Result<(), BackendError> {
        let mut log = lock(&self.log);
        if let Some(err) = log.fail_with.clone() {
            return Err(err);
        }
        log.restore_requests += 1;
        Ok(())
    }

    fn finish_transaction(&self, transaction_id: &TransactionId) -> Result<(), BackendError> {
        let mut log = lock(&self.log);
        if let Some(err) = log.fail_with.clone() {
            return Err(err);
        }
        log.finished.push(transaction_id.clone());
        Ok(())
    }
}

/// Catalog that records requests and never answers on its own.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    requests: Mutex<Vec<Vec<ProductId>>>,
    fail_with: Mutex<Option<BackendError>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<BackendError>) {
        *lock(&self.fail_with) = error;
    }

    pub fn requests(&self) -> Vec<Vec<ProductId>> {
        lock(&self.requests).clone()
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn request_products(&self, product_ids: &[ProductId]) -> Result<(), BackendError> {
        if let Some(err) = lock(&self.fail_with).clone() {
            return Err(err);
        }
        lock(&self.requests).push(product_ids.to_vec());
        Ok(())
    }
}

/// Telemetry sink that keeps rendered error messages.
#[derive(Debug, Default)]
pub struct InMemoryTelemetry {
    reports: Mutex<Vec<String>>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        lock(&self.reports).clone()
    }
}

impl TelemetrySink for InMemoryTelemetry {
    fn report(&self, error: &(dyn std::error::Error + 'static)) {
        lock(&self.reports).push(error.to_string());
    }
}

/// Record store pointing at a fixed (possibly absent) path.
#[derive(Debug, Clone, Default)]
pub struct StaticReceiptStore {
    path: Option<PathBuf>,
}

impl StaticReceiptStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ReceiptStore for StaticReceiptStore {
    fn current_record_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}
