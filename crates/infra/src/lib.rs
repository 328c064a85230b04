//! Infrastructure layer: collaborator ports, the entitlement manager and its
//! parts, configuration, and in-memory adapters.

pub mod catalog;
pub mod config;
pub mod in_memory;
pub mod manager;
pub mod ports;
pub mod processor;
pub mod receipt_reader;
pub mod restoration;
pub mod telemetry;
pub mod worker;


pub use catalog::{CatalogError, CatalogLoader};
pub use config::EntitlementConfig;
pub use manager::{Collaborators, EntitlementManager, ManagerError};
pub use ports::{
    BackendError, Clock, PaymentQueue, ProductCatalog, ProductsResponse, ReceiptDecoder,
    ReceiptStore, StoreNotification, SystemClock, TelemetrySink,
};
pub use processor::{BatchOutcome, TransactionProcessor};
pub use receipt_reader::{FileReceiptStore, JsonReceiptDecoder, PurchaseRecordReader, ReceiptError};
pub use restoration::RestorationCoordinator;
pub use telemetry::TracingTelemetry;
pub use worker::{NotificationWorker, WorkerHandle};
