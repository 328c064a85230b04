//! Simulated purchase scenarios for demo and test environments.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use entitlekit_core::DomainError;

use crate::product::ProductIds;
use crate::receipt::PurchaseEntry;

/// A scenario that replaces the real purchase record when configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationMode {
    /// An active subscription expiring one day after the read.
    Subscription,
    /// The permanent unlock only.
    OneTimeUnlock,
    /// Both of the above.
    Both,
}

impl SimulationMode {
    /// How far past the read a simulated subscription expires.
    pub fn subscription_length() -> Duration {
        Duration::days(1)
    }

    /// Entries a real record would contain for this scenario at `now`.
    pub fn entries(&self, ids: &ProductIds, now: DateTime<Utc>) -> Vec<PurchaseEntry> {
        let subscription = || {
            PurchaseEntry::expiring(ids.subscription.clone(), now + Self::subscription_length())
        };
        let unlock = || PurchaseEntry::permanent(ids.unlock.clone());

        match self {
            SimulationMode::Subscription => vec![subscription()],
            SimulationMode::OneTimeUnlock => vec![unlock()],
            SimulationMode::Both => vec![unlock(), subscription()],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationMode::Subscription => "subscription",
            SimulationMode::OneTimeUnlock => "one-time-unlock",
            SimulationMode::Both => "both",
        }
    }
}

impl FromStr for SimulationMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subscription" => Ok(SimulationMode::Subscription),
            "one-time-unlock" | "one_time_unlock" | "pro_version" => {
                Ok(SimulationMode::OneTimeUnlock)
            }
            "both" => Ok(SimulationMode::Both),
            other => Err(DomainError::validation(format!(
                "unknown simulation mode: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::compute;
    use crate::status::EntitlementStatus;

    #[test]
    fn parses_known_names_and_aliases() {
        let parse = |s: &str| s.parse::<SimulationMode>();
        assert_eq!(parse("subscription"), Ok(SimulationMode::Subscription));
        assert_eq!(parse("one-time-unlock"), Ok(SimulationMode::OneTimeUnlock));
        assert_eq!(parse("pro_version"), Ok(SimulationMode::OneTimeUnlock));
        assert_eq!(parse(" BOTH "), Ok(SimulationMode::Both));
        assert!("lifetime".parse::<SimulationMode>().is_err());
    }

    #[test]
    fn scenarios_compute_to_matching_statuses() {
        let ids = ProductIds::default();
        let now = Utc::now();
        let exp = now + SimulationMode::subscription_length();

        assert_eq!(
            compute(&SimulationMode::Subscription.entries(&ids, now), &ids, now),
            EntitlementStatus::ActiveSubscription { expires_at: exp }
        );
        assert_eq!(
            compute(&SimulationMode::OneTimeUnlock.entries(&ids, now), &ids, now),
            EntitlementStatus::ProUnlocked
        );
        assert_eq!(
            compute(&SimulationMode::Both.entries(&ids, now), &ids, now),
            EntitlementStatus::ProUnlockedAndActiveSubscription { expires_at: exp }
        );
    }
}
