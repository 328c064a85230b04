//! Catalog loader.
//!
//! Requests metadata for both known products and publishes a `CatalogStatus`.
//! A response missing either product is a failure and is reported to telemetry.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use entitlekit_core::ProductId;
use entitlekit_entitlements::{CatalogStatus, ProductIdentifier, ProductIds};
use entitlekit_events::StatusCell;

use crate::ports::{ProductCatalog, ProductsResponse, TelemetrySink};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog response is missing products: {}", join(missing))]
    MissingProducts { missing: Vec<ProductId> },

    #[error("catalog request failed: {0}")]
    Transport(String),
}

fn join(ids: &[ProductId]) -> String {
    ids.iter().map(ProductId::as_str).collect::<Vec<_>>().join(", ")
}

pub struct CatalogLoader {
    ids: ProductIds,
    catalog: Arc<dyn ProductCatalog>,
    telemetry: Arc<dyn TelemetrySink>,
    status: Arc<StatusCell<CatalogStatus>>,
}

impl CatalogLoader {
    pub fn new(
        ids: ProductIds,
        catalog: Arc<dyn ProductCatalog>,
        telemetry: Arc<dyn TelemetrySink>,
        status: Arc<StatusCell<CatalogStatus>>,
    ) -> Self {
        Self {
            ids,
            catalog,
            telemetry,
            status,
        }
    }

    /// Publish `Loading` and issue a request for both products.
    ///
    /// Calling again while a request is in flight issues another one; the
    /// last response to arrive wins.
    pub fn load(&self) {
        self.status.set(CatalogStatus::Loading);
        let requested = self.ids.all();
        info!(products = %join(&requested), "requesting product catalog");

        if let Err(err) = self.catalog.request_products(&requested) {
            self.request_failed(err.to_string());
        }
    }

    /// Resolve both products from a catalog response.
    pub fn products_received(&self, response: &ProductsResponse) -> CatalogStatus {
        let subscription = response.find(self.ids.product_id(ProductIdentifier::Subscription));
        let unlock = response.find(self.ids.product_id(ProductIdentifier::OneTimeUnlock));

        let status = match (subscription, unlock) {
            (Some(subscription), Some(unlock)) => {
                info!(
                    subscription = %subscription.product_id,
                    unlock = %unlock.product_id,
                    "product catalog loaded"
                );
                CatalogStatus::Loaded {
                    subscription: subscription.clone(),
                    unlock: unlock.clone(),
                }
            }
            _ => {
                let missing: Vec<ProductId> = self
                    .ids
                    .all()
                    .into_iter()
                    .filter(|id| response.find(id).is_none())
                    .collect();
                let err = CatalogError::MissingProducts { missing };
                warn!(
                    error = %err,
                    invalid = %join(&response.invalid_product_ids),
                    "product catalog incomplete"
                );
                self.telemetry.report(&err);
                CatalogStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };

        self.status.set(status.clone());
        status
    }

    /// Transport failure of the catalog request.
    pub fn request_failed(&self, reason: impl Into<String>) -> CatalogStatus {
        let err = CatalogError::Transport(reason.into());
        warn!(error = %err, "product catalog request failed");
        let status = CatalogStatus::Failed {
            reason: err.to_string(),
        };
        self.status.set(status.clone());
        status
    }
}

impl core::fmt::Debug for CatalogLoader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CatalogLoader")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryProductCatalog, InMemoryTelemetry};
    use crate::ports::BackendError;
    use entitlekit_entitlements::StoreProduct;

    fn loader() -> (
        CatalogLoader,
        Arc<InMemoryProductCatalog>,
        Arc<InMemoryTelemetry>,
        Arc<StatusCell<CatalogStatus>>,
    ) {
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let status = Arc::new(StatusCell::new(CatalogStatus::Pending));
        let loader = CatalogLoader::new(
            ProductIds::default(),
            catalog.clone(),
            telemetry.clone(),
            status.clone(),
        );
        (loader, catalog, telemetry, status)
    }

    #[test]
    fn load_requests_both_products() {
        let (loader, catalog, _, status) = loader();
        let sub = status.subscribe_changes();

        loader.load();

        assert_eq!(catalog.requests(), vec![ProductIds::default().all().to_vec()]);
        assert_eq!(sub.drain(), vec![CatalogStatus::Loading]);
    }

    #[test]
    fn complete_response_loads() {
        let (loader, _, telemetry, status) = loader();
        let response = ProductsResponse {
            products: vec![
                StoreProduct::new("pro_version").with_title("Pro"),
                StoreProduct::new("pro_subscription").with_title("Pro Monthly"),
            ],
            invalid_product_ids: vec![],
        };

        let result = loader.products_received(&response);

        assert_eq!(
            result,
            CatalogStatus::Loaded {
                subscription: StoreProduct::new("pro_subscription").with_title("Pro Monthly"),
                unlock: StoreProduct::new("pro_version").with_title("Pro"),
            }
        );
        assert_eq!(status.get(), result);
        assert!(telemetry.reports().is_empty());
    }

    #[test]
    fn missing_product_fails_and_reports() {
        let (loader, _, telemetry, status) = loader();
        let response = ProductsResponse {
            products: vec![StoreProduct::new("pro_subscription")],
            invalid_product_ids: vec![ProductId::new("pro_version")],
        };

        let result = loader.products_received(&response);

        match &result {
            CatalogStatus::Failed { reason } => assert!(reason.contains("pro_version")),
            other => panic!("Expected Failed, got {other:?}"),
        }
        assert_eq!(status.get(), result);
        assert_eq!(telemetry.reports().len(), 1);
    }

    #[test]
    fn synchronous_request_error_fails_without_telemetry() {
        let (loader, catalog, telemetry, status) = loader();
        catalog.fail_with(Some(BackendError::Unavailable("no network".into())));
        let sub = status.subscribe_changes();

        loader.load();

        let seen = sub.drain();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], CatalogStatus::Loading);
        assert!(matches!(seen[1], CatalogStatus::Failed { .. }));
        assert!(telemetry.reports().is_empty());
    }
}
