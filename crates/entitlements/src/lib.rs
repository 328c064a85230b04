//! Entitlement domain module.
//!
//! This crate contains the rules that turn purchase records and payment
//! transaction updates into entitlement statuses, implemented purely as
//! deterministic domain logic (no IO, no threads, no clock reads).

pub mod calculator;
pub mod product;
pub mod receipt;
pub mod simulation;
pub mod status;
pub mod transaction;

pub use calculator::{compute, compute_classified};
pub use product::{ProductIdentifier, ProductIds, StoreProduct};
pub use receipt::PurchaseEntry;
pub use simulation::SimulationMode;
pub use status::{CatalogStatus, EntitlementStatus, RestorationStatus, TransactionStatus};
pub use transaction::{
    PaymentTransaction, PendingTransaction, TransactionEvent, TransactionState, TransactionUpdate,
};
