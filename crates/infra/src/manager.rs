//! Entitlement manager facade.
//!
//! Owns the four published statuses and routes backend notifications to the
//! processor, catalog loader and restoration coordinator. Constructed once at
//! startup and shared by `Arc`; state lives in memory only and is recomputed
//! from the purchase record on every start.

use std::convert::Infallible;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use entitlekit_core::ProductId;
use entitlekit_entitlements::{
    CatalogStatus, EntitlementStatus, PaymentTransaction, ProductIds, RestorationStatus,
    StoreProduct, TransactionStatus,
};
use entitlekit_events::{EventBus, StatusCell, Subscription};

use crate::catalog::CatalogLoader;
use crate::config::EntitlementConfig;
use crate::ports::{
    BackendError, Clock, PaymentQueue, ProductCatalog, ReceiptDecoder, ReceiptStore,
    StoreNotification, SystemClock, TelemetrySink,
};
use crate::processor::{BatchOutcome, TransactionProcessor};
use crate::receipt_reader::{FileReceiptStore, JsonReceiptDecoder, PurchaseRecordReader};
use crate::restoration::RestorationCoordinator;
use crate::telemetry::TracingTelemetry;
use crate::worker::{NotificationWorker, WorkerHandle};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("product {0} is not sold by this application")]
    UnknownProduct(ProductId),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to start notification worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Everything the manager talks to outside its own state.
#[derive(Clone)]
pub struct Collaborators {
    pub queue: Arc<dyn PaymentQueue>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub receipts: Arc<dyn ReceiptStore>,
    pub decoder: Arc<dyn ReceiptDecoder>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Platform backend plus the file record store, JSON decoder, tracing
    /// telemetry and wall clock.
    pub fn with_defaults(
        config: &EntitlementConfig,
        queue: Arc<dyn PaymentQueue>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            queue,
            catalog,
            receipts: Arc::new(FileReceiptStore::new(
                config.receipt_path.clone(),
                &config.app_name,
            )),
            decoder: Arc::new(JsonReceiptDecoder),
            telemetry: Arc::new(TracingTelemetry),
            clock: Arc::new(SystemClock),
        }
    }
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

pub struct EntitlementManager {
    ids: ProductIds,
    queue: Arc<dyn PaymentQueue>,
    reader: Arc<PurchaseRecordReader>,
    processor: TransactionProcessor,
    catalog: CatalogLoader,
    restoration: RestorationCoordinator,

    entitlement: Arc<StatusCell<EntitlementStatus>>,
    transaction: Arc<StatusCell<TransactionStatus>>,
    catalog_status: Arc<StatusCell<CatalogStatus>>,
    restoration_status: Arc<StatusCell<RestorationStatus>>,
}

impl EntitlementManager {
    /// Wire the manager and seed the entitlement from the current record.
    pub fn new(config: &EntitlementConfig, collaborators: Collaborators) -> Arc<Self> {
        let Collaborators {
            queue,
            catalog,
            receipts,
            decoder,
            telemetry,
            clock,
        } = collaborators;

        if let Some(mode) = config.simulation {
            warn!(mode = mode.as_str(), "purchase record simulation enabled");
        }

        let reader = Arc::new(PurchaseRecordReader::new(
            config.product_ids.clone(),
            config.simulation,
            receipts,
            decoder,
            clock.clone(),
        ));

        let entitlement = Arc::new(StatusCell::new(reader.current_status()));
        let transaction = Arc::new(StatusCell::new(TransactionStatus::default()));
        let catalog_status = Arc::new(StatusCell::new(CatalogStatus::default()));
        let restoration_status = Arc::new(StatusCell::new(RestorationStatus::default()));

        let processor = TransactionProcessor::new(
            reader.clone(),
            queue.clone(),
            clock,
            transaction.clone(),
            entitlement.clone(),
        );
        let catalog = CatalogLoader::new(
            config.product_ids.clone(),
            catalog,
            telemetry,
            catalog_status.clone(),
        );
        let restoration = RestorationCoordinator::new(queue.clone(), restoration_status.clone());

        info!(entitlement = ?entitlement.get(), "entitlement manager started");

        Arc::new(Self {
            ids: config.product_ids.clone(),
            queue,
            reader,
            processor,
            catalog,
            restoration,
            entitlement,
            transaction,
            catalog_status,
            restoration_status,
        })
    }

    /// Start a background worker that feeds every notification published on
    /// `bus` into [`EntitlementManager::handle_notification`].
    pub fn observe<B>(self: &Arc<Self>, bus: &B) -> Result<WorkerHandle, ManagerError>
    where
        B: EventBus<StoreNotification> + ?Sized,
    {
        let manager = Arc::clone(self);
        let handle = NotificationWorker::spawn("entitlement-observer", bus, move |n: StoreNotification| {
            manager.handle_notification(n);
            Ok::<(), Infallible>(())
        })?;
        Ok(handle)
    }

    pub fn product_ids(&self) -> &ProductIds {
        &self.ids
    }

    // Queries

    pub fn entitlement_status(&self) -> EntitlementStatus {
        self.entitlement.get()
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction.get()
    }

    pub fn catalog_status(&self) -> CatalogStatus {
        self.catalog_status.get()
    }

    pub fn restoration_status(&self) -> RestorationStatus {
        self.restoration_status.get()
    }

    // Subscriptions

    /// Current entitlement first, then every recomputation.
    pub fn subscribe_entitlement(&self) -> Subscription<EntitlementStatus> {
        self.entitlement.subscribe()
    }

    /// Current catalog status first, then every change.
    pub fn subscribe_catalog(&self) -> Subscription<CatalogStatus> {
        self.catalog_status.subscribe()
    }

    /// Transaction progress published after this call.
    pub fn subscribe_transactions(&self) -> Subscription<TransactionStatus> {
        self.transaction.subscribe_changes()
    }

    /// Restoration progress published after this call.
    pub fn subscribe_restoration(&self) -> Subscription<RestorationStatus> {
        self.restoration_status.subscribe_changes()
    }

    // Commands

    pub fn load_catalog(&self) {
        self.catalog.load();
    }

    /// Submit a purchase; progress arrives as transaction notifications.
    ///
    /// A failed submission is returned and also published as
    /// `TransactionStatus::Failed`.
    pub fn purchase(&self, product: &StoreProduct) -> Result<(), ManagerError> {
        let result = match self.ids.classify(&product.product_id) {
            None => Err(ManagerError::UnknownProduct(product.product_id.clone())),
            Some(identifier) => {
                info!(product = %product.product_id, kind = identifier.as_str(), "submitting purchase");
                self.queue.submit(product).map_err(ManagerError::from)
            }
        };

        if let Err(err) = &result {
            warn!(product = %product.product_id, error = %err, "purchase not submitted");
            self.transaction.set(TransactionStatus::Failed {
                reason: Some(err.to_string()),
            });
        }
        result
    }

    pub fn restore_purchases(&self) {
        self.restoration.restore();
    }

    /// Re-read the purchase record and publish the result.
    pub fn refresh_entitlement(&self) -> EntitlementStatus {
        self.reader.refresh_into(&self.entitlement)
    }

    /// Run one transaction batch through the processor.
    pub fn process_transactions(&self, batch: &[PaymentTransaction]) -> BatchOutcome {
        self.processor.process_batch(batch)
    }

    pub fn handle_notification(&self, notification: StoreNotification) {
        debug!(kind = notification.kind(), "store notification");
        match notification {
            StoreNotification::TransactionsUpdated { transactions } => {
                self.process_transactions(&transactions);
            }
            StoreNotification::RestoreFinished => self.restoration.finished(),
            StoreNotification::RestoreFailed { reason } => self.restoration.failed(reason),
            StoreNotification::ProductsReceived { response } => {
                self.catalog.products_received(&response);
            }
            StoreNotification::ProductsRequestFailed { reason } => {
                self.catalog.request_failed(reason);
            }
        }
    }
}

impl core::fmt::Debug for EntitlementManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntitlementManager")
            .field("ids", &self.ids)
            .field("entitlement", &self.entitlement.get())
            .field("processor", &self.processor)
            .finish_non_exhaustive()
    }
}
