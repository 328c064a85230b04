use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use entitlekit_core::ProductId;

/// One line item decoded from the signed purchase record.
///
/// `expires_at` is only present for renewing products. Entries are immutable
/// working data: produced by a record read, consumed by one computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseEntry {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PurchaseEntry {
    /// Entry for a permanent (non-expiring) purchase.
    pub fn permanent(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: product_id.into(),
            expires_at: None,
        }
    }

    /// Entry for a renewing purchase that lapses at `expires_at`.
    pub fn expiring(product_id: impl Into<ProductId>, expires_at: DateTime<Utc>) -> Self {
        Self {
            product_id: product_id.into(),
            expires_at: Some(expires_at),
        }
    }
}
