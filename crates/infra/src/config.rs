use std::env;
use std::path::PathBuf;

use tracing::warn;

use entitlekit_entitlements::{ProductIds, SimulationMode};
use entitlekit_observability::LogFormat;

pub const SIMULATION_VAR: &str = "IN_APP_PURCHASE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementConfig {
    pub product_ids: ProductIds,
    /// Synthesized purchase record for development builds. Never set in production.
    pub simulation: Option<SimulationMode>,
    /// Explicit purchase record location; falls back to the platform data dir.
    pub receipt_path: Option<PathBuf>,
    pub app_name: String,
    pub log_format: LogFormat,
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            product_ids: ProductIds::default(),
            simulation: None,
            receipt_path: None,
            app_name: "entitlekit".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl EntitlementConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing or blank values keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let simulation = var(SIMULATION_VAR).and_then(|raw| match raw.parse::<SimulationMode>() {
            Ok(mode) => Some(mode),
            Err(err) => {
                warn!(value = %raw, error = %err, "ignoring unknown simulation mode");
                None
            }
        });

        let log_format = var("ENTITLEKIT_LOG_FORMAT")
            .and_then(|raw| match raw.parse::<LogFormat>() {
                Ok(format) => Some(format),
                Err(err) => {
                    warn!(value = %raw, error = %err, "ignoring unknown log format");
                    None
                }
            })
            .unwrap_or(defaults.log_format);

        let product_ids = ProductIds::new(
            var("ENTITLEKIT_SUBSCRIPTION_PRODUCT_ID")
                .unwrap_or_else(|| ProductIds::DEFAULT_SUBSCRIPTION.to_string()),
            var("ENTITLEKIT_UNLOCK_PRODUCT_ID")
                .unwrap_or_else(|| ProductIds::DEFAULT_UNLOCK.to_string()),
        );

        Self {
            product_ids,
            simulation,
            receipt_path: var("ENTITLEKIT_RECEIPT_PATH").map(PathBuf::from),
            app_name: var("ENTITLEKIT_APP_NAME").unwrap_or(defaults.app_name),
            log_format,
        }
    }
}
