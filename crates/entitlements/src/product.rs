use serde::{Deserialize, Serialize};

use entitlekit_core::ProductId;

/// The two products this system knows how to entitle.
///
/// Anything the backend reports outside this set is ignored, so new products
/// can be added to the store without a client release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductIdentifier {
    /// Auto-renewing subscription; entries carry an expiration date.
    Subscription,
    /// Non-consumable permanent unlock; never expires.
    OneTimeUnlock,
}

impl ProductIdentifier {
    pub const ALL: [ProductIdentifier; 2] =
        [ProductIdentifier::Subscription, ProductIdentifier::OneTimeUnlock];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductIdentifier::Subscription => "subscription",
            ProductIdentifier::OneTimeUnlock => "one_time_unlock",
        }
    }
}

/// Mapping between the closed [`ProductIdentifier`] set and backend product ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIds {
    pub subscription: ProductId,
    pub unlock: ProductId,
}

impl ProductIds {
    pub const DEFAULT_SUBSCRIPTION: &'static str = "pro_subscription";
    pub const DEFAULT_UNLOCK: &'static str = "pro_version";

    pub fn new(subscription: impl Into<ProductId>, unlock: impl Into<ProductId>) -> Self {
        Self {
            subscription: subscription.into(),
            unlock: unlock.into(),
        }
    }

    /// Map a backend product id onto the known set (`None` = not ours).
    pub fn classify(&self, product_id: &ProductId) -> Option<ProductIdentifier> {
        if *product_id == self.subscription {
            Some(ProductIdentifier::Subscription)
        } else if *product_id == self.unlock {
            Some(ProductIdentifier::OneTimeUnlock)
        } else {
            None
        }
    }

    pub fn product_id(&self, identifier: ProductIdentifier) -> &ProductId {
        match identifier {
            ProductIdentifier::Subscription => &self.subscription,
            ProductIdentifier::OneTimeUnlock => &self.unlock,
        }
    }

    /// Backend ids for both known products, subscription first.
    pub fn all(&self) -> [ProductId; 2] {
        [self.subscription.clone(), self.unlock.clone()]
    }
}

impl Default for ProductIds {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SUBSCRIPTION, Self::DEFAULT_UNLOCK)
    }
}

/// Opaque product handle returned by the catalog.
///
/// Only the id is interpreted here; everything else is display metadata
/// passed through to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProduct {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl StoreProduct {
    pub fn new(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: product_id.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
