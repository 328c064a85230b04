//! The four status values published by the entitlement manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::product::StoreProduct;

/// Canonical answer to "what is this user allowed to use".
///
/// Always derivable from the current purchase entries and the current time;
/// see [`crate::calculator::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntitlementStatus {
    #[default]
    NoPurchase,
    /// Permanent unlock, no expiration.
    ProUnlocked,
    ActiveSubscription { expires_at: DateTime<Utc> },
    ExpiredSubscription { expires_at: DateTime<Utc> },
    ProUnlockedAndActiveSubscription { expires_at: DateTime<Utc> },
}

impl EntitlementStatus {
    /// Whether paid features are currently available.
    pub fn grants_pro_access(&self) -> bool {
        matches!(
            self,
            EntitlementStatus::ProUnlocked
                | EntitlementStatus::ActiveSubscription { .. }
                | EntitlementStatus::ProUnlockedAndActiveSubscription { .. }
        )
    }

    /// Whether the one-time unlock has been bought.
    pub fn unlock_purchased(&self) -> bool {
        matches!(
            self,
            EntitlementStatus::ProUnlocked
                | EntitlementStatus::ProUnlockedAndActiveSubscription { .. }
        )
    }

    /// Subscription expiration carried by this status, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            EntitlementStatus::NoPurchase | EntitlementStatus::ProUnlocked => None,
            EntitlementStatus::ActiveSubscription { expires_at }
            | EntitlementStatus::ExpiredSubscription { expires_at }
            | EntitlementStatus::ProUnlockedAndActiveSubscription { expires_at } => {
                Some(*expires_at)
            }
        }
    }
}

/// Status of the most recently observed purchase attempt (last write wins).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Idle,
    Purchasing,
    Purchased,
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Waiting on external approval (e.g. a guardian).
    Deferred,
}

/// Progress of the product catalog request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CatalogStatus {
    #[default]
    Pending,
    Loading,
    Loaded {
        subscription: StoreProduct,
        unlock: StoreProduct,
    },
    Failed {
        reason: String,
    },
}

/// Progress of a purchase restoration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestorationStatus {
    #[default]
    Idle,
    Loading,
    Finished,
    Failed {
        reason: String,
    },
}

impl RestorationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RestorationStatus::Finished | RestorationStatus::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn access_flags_follow_variant() {
        let exp = at(1_700_000_000);

        assert!(!EntitlementStatus::NoPurchase.grants_pro_access());
        assert!(EntitlementStatus::ProUnlocked.grants_pro_access());
        assert!(EntitlementStatus::ActiveSubscription { expires_at: exp }.grants_pro_access());
        assert!(!EntitlementStatus::ExpiredSubscription { expires_at: exp }.grants_pro_access());

        assert!(EntitlementStatus::ProUnlocked.unlock_purchased());
        assert!(
            EntitlementStatus::ProUnlockedAndActiveSubscription { expires_at: exp }
                .unlock_purchased()
        );
        assert!(!EntitlementStatus::ActiveSubscription { expires_at: exp }.unlock_purchased());
    }

    #[test]
    fn expires_at_only_for_subscription_variants() {
        let exp = at(1_700_000_000);
        assert_eq!(EntitlementStatus::ProUnlocked.expires_at(), None);
        assert_eq!(
            EntitlementStatus::ExpiredSubscription { expires_at: exp }.expires_at(),
            Some(exp)
        );
    }

    #[test]
    fn statuses_serialize_with_status_tag() {
        let json = serde_json::to_value(EntitlementStatus::ActiveSubscription {
            expires_at: at(0),
        })
        .unwrap();
        assert_eq!(json["status"], "active_subscription");
        assert_eq!(json["expires_at"], "1970-01-01T00:00:00Z");

        let json = serde_json::to_value(TransactionStatus::Failed { reason: None }).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "failed" }));
    }
}
