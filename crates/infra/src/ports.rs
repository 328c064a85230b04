//! Collaborator interfaces (purchase backend, catalog, record store, telemetry).
//!
//! The entitlement core never talks to a platform SDK directly. Adapters
//! implement these traits and report asynchronous completions by publishing
//! [`StoreNotification`]s on an event bus the manager observes.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use entitlekit_core::{ProductId, TransactionId};
use entitlekit_entitlements::{PaymentTransaction, PurchaseEntry, StoreProduct};

use crate::receipt_reader::ReceiptError;

/// Synchronous failure returned by a backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("purchase backend unavailable: {0}")]
    Unavailable(String),

    #[error("purchase backend rejected the request: {0}")]
    Rejected(String),
}

/// Asynchronous notification delivered by the purchase backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreNotification {
    /// One batch of transaction lifecycle updates.
    TransactionsUpdated { transactions: Vec<PaymentTransaction> },
    /// Restoration completed; restored transactions were delivered separately.
    RestoreFinished,
    RestoreFailed { reason: String },
    ProductsReceived { response: ProductsResponse },
    /// The catalog request failed in transport.
    ProductsRequestFailed { reason: String },
}

impl StoreNotification {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreNotification::TransactionsUpdated { .. } => "transactions_updated",
            StoreNotification::RestoreFinished => "restore_finished",
            StoreNotification::RestoreFailed { .. } => "restore_failed",
            StoreNotification::ProductsReceived { .. } => "products_received",
            StoreNotification::ProductsRequestFailed { .. } => "products_request_failed",
        }
    }
}

/// Catalog response: what resolved and what the backend did not recognise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<StoreProduct>,
    #[serde(default)]
    pub invalid_product_ids: Vec<ProductId>,
}

impl ProductsResponse {
    pub fn find(&self, product_id: &ProductId) -> Option<&StoreProduct> {
        self.products.iter().find(|p| &p.product_id == product_id)
    }
}

/// The backend's payment queue.
pub trait PaymentQueue: Send + Sync {
    /// Start a purchase. Progress arrives as transaction notifications.
    fn submit(&self, product: &StoreProduct) -> Result<(), BackendError>;

    /// Ask the backend to re-deliver previously completed transactions.
    fn restore_completed_transactions(&self) -> Result<(), BackendError>;

    /// Acknowledge a terminal transaction, removing it from redelivery.
    ///
    /// Called exactly once per terminal transaction per delivery.
    fn finish_transaction(&self, transaction_id: &TransactionId) -> Result<(), BackendError>;
}

/// Product metadata service.
pub trait ProductCatalog: Send + Sync {
    /// Request metadata; the answer arrives as a products notification.
    fn request_products(&self, product_ids: &[ProductId]) -> Result<(), BackendError>;
}

/// Locates the signed purchase record.
pub trait ReceiptStore: Send + Sync {
    fn current_record_path(&self) -> Option<PathBuf>;
}

/// Decodes a purchase record into entries.
pub trait ReceiptDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<PurchaseEntry>, ReceiptError>;
}

/// Fire-and-forget error reporting.
pub trait TelemetrySink: Send + Sync {
    fn report(&self, error: &(dyn std::error::Error + 'static));
}

/// Source of "now" for expiration checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
