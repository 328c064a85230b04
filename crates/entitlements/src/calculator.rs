//! Entitlement derivation: purchase entries + now -> one status.
//!
//! Pure and total. Re-running it with the same inputs yields the same status,
//! so the manager can recompute as often as it likes.

use chrono::{DateTime, Utc};

use crate::product::{ProductIdentifier, ProductIds};
use crate::receipt::PurchaseEntry;
use crate::status::EntitlementStatus;

/// Derive the entitlement status from raw purchase entries.
///
/// Entries whose product id is not one of `ids` are ignored.
pub fn compute(entries: &[PurchaseEntry], ids: &ProductIds, now: DateTime<Utc>) -> EntitlementStatus {
    compute_classified(
        entries
            .iter()
            .filter_map(|e| ids.classify(&e.product_id).map(|kind| (kind, e.expires_at))),
        now,
    )
}

/// Derive the entitlement status from entries already mapped onto the known
/// product set.
pub fn compute_classified<I>(entries: I, now: DateTime<Utc>) -> EntitlementStatus
where
    I: IntoIterator<Item = (ProductIdentifier, Option<DateTime<Utc>>)>,
{
    let mut unlocked = false;
    let mut latest_expiration: Option<DateTime<Utc>> = None;

    for (kind, expires_at) in entries {
        match kind {
            ProductIdentifier::OneTimeUnlock => unlocked = true,
            // Undated subscription entries carry no entitlement information.
            ProductIdentifier::Subscription => {
                latest_expiration = latest_expiration.max(expires_at);
            }
        }
    }

    match (unlocked, latest_expiration) {
        (false, None) => EntitlementStatus::NoPurchase,
        (true, None) => EntitlementStatus::ProUnlocked,
        (false, Some(expires_at)) if expires_at > now => {
            EntitlementStatus::ActiveSubscription { expires_at }
        }
        (false, Some(expires_at)) => EntitlementStatus::ExpiredSubscription { expires_at },
        (true, Some(expires_at)) if expires_at > now => {
            EntitlementStatus::ProUnlockedAndActiveSubscription { expires_at }
        }
        // The permanent unlock dominates a lapsed subscription.
        (true, Some(_)) => EntitlementStatus::ProUnlocked,
    }
}
