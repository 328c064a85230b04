//! Purchase record reader.
//!
//! Turns the locally held purchase record into entries for the calculator.
//! Read failures never surface: an absent record and an unreadable one both
//! read as "no entries", which computes to `NoPurchase`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use entitlekit_core::ProductId;
use entitlekit_entitlements::{
    EntitlementStatus, ProductIds, PurchaseEntry, SimulationMode, compute,
};
use entitlekit_events::StatusCell;

use crate::ports::{Clock, ReceiptDecoder, ReceiptStore};

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("failed to read purchase record: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed purchase record: {0}")]
    Malformed(String),
}

/// Record store backed by a file on disk.
///
/// Uses the configured path, or `<data dir>/<app_name>/receipt.json`.
#[derive(Debug, Clone)]
pub struct FileReceiptStore {
    path: Option<PathBuf>,
}

impl FileReceiptStore {
    pub const FILE_NAME: &'static str = "receipt.json";

    pub fn new(path: Option<PathBuf>, app_name: &str) -> Self {
        let path = path.or_else(|| dirs::data_dir().map(|d| d.join(app_name).join(Self::FILE_NAME)));
        Self { path }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl ReceiptStore for FileReceiptStore {
    fn current_record_path(&self) -> Option<PathBuf> {
        self.path.as_ref().filter(|p| p.is_file()).cloned()
    }
}

/// JSON record layout:
///
/// ```json
/// { "in_app": [ { "product_id": "pro_subscription", "expires_date": "2026-01-01T00:00:00Z" } ] }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReceiptDecoder;

#[derive(Debug, Deserialize)]
struct RecordDocument {
    #[serde(default)]
    in_app: Vec<RecordLine>,
}

#[derive(Debug, Deserialize)]
struct RecordLine {
    product_id: ProductId,
    #[serde(default)]
    expires_date: Option<DateTime<Utc>>,
}

impl ReceiptDecoder for JsonReceiptDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<PurchaseEntry>, ReceiptError> {
        let doc: RecordDocument =
            serde_json::from_slice(bytes).map_err(|e| ReceiptError::Malformed(e.to_string()))?;
        Ok(doc
            .in_app
            .into_iter()
            .map(|line| PurchaseEntry {
                product_id: line.product_id,
                expires_at: line.expires_date,
            })
            .collect())
    }
}

/// Reads purchase entries and derives the entitlement status from them.
pub struct PurchaseRecordReader {
    ids: ProductIds,
    simulation: Option<SimulationMode>,
    store: Arc<dyn ReceiptStore>,
    decoder: Arc<dyn ReceiptDecoder>,
    clock: Arc<dyn Clock>,
}

impl PurchaseRecordReader {
    pub fn new(
        ids: ProductIds,
        simulation: Option<SimulationMode>,
        store: Arc<dyn ReceiptStore>,
        decoder: Arc<dyn ReceiptDecoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ids,
            simulation,
            store,
            decoder,
            clock,
        }
    }

    pub fn product_ids(&self) -> &ProductIds {
        &self.ids
    }

    /// Entries for the known products at `now` (empty when nothing is readable).
    pub fn read(&self, now: DateTime<Utc>) -> Vec<PurchaseEntry> {
        if let Some(mode) = self.simulation {
            debug!(mode = mode.as_str(), "using simulated purchase record");
            return mode.entries(&self.ids, now);
        }

        let Some(path) = self.store.current_record_path() else {
            debug!("no purchase record present");
            return Vec::new();
        };

        let decoded = std::fs::read(&path)
            .map_err(ReceiptError::from)
            .and_then(|bytes| self.decoder.decode(&bytes));

        match decoded {
            Ok(entries) => {
                let total = entries.len();
                let known: Vec<_> = entries
                    .into_iter()
                    .filter(|e| self.ids.classify(&e.product_id).is_some())
                    .collect();
                debug!(path = %path.display(), total, known = known.len(), "read purchase record");
                known
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "purchase record unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    /// Read + compute at the clock's current time.
    pub fn current_status(&self) -> EntitlementStatus {
        let now = self.clock.now();
        compute(&self.read(now), &self.ids, now)
    }

    /// Recompute under the cell's lock and publish the result.
    pub fn refresh_into(&self, cell: &StatusCell<EntitlementStatus>) -> EntitlementStatus {
        cell.replace_with(|_| self.current_status())
    }
}

impl core::fmt::Debug for PurchaseRecordReader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PurchaseRecordReader")
            .field("ids", &self.ids)
            .field("simulation", &self.simulation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{FixedClock, StaticReceiptStore};
    use chrono::{Duration, TimeZone};
    use std::io::Write;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap()
    }

    fn reader_for(path: Option<PathBuf>, simulation: Option<SimulationMode>) -> PurchaseRecordReader {
        PurchaseRecordReader::new(
            ProductIds::default(),
            simulation,
            Arc::new(StaticReceiptStore::new(path)),
            Arc::new(JsonReceiptDecoder),
            Arc::new(FixedClock::new(now())),
        )
    }

    fn write_record(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_record_reads_as_empty() {
        let reader = reader_for(None, None);
        assert!(reader.read(now()).is_empty());
        assert_eq!(reader.current_status(), EntitlementStatus::NoPurchase);
    }

    #[test]
    fn corrupt_record_reads_as_empty() {
        let file = write_record("{ this is not json");
        let reader = reader_for(Some(file.path().to_path_buf()), None);
        assert!(reader.read(now()).is_empty());
    }

    #[test]
    fn unknown_products_are_dropped() {
        let file = write_record(
            r#"{"in_app":[
                {"product_id":"pro_version"},
                {"product_id":"coins_pack_100"},
                {"product_id":"pro_subscription","expires_date":"2026-06-01T00:00:00Z"}
            ]}"#,
        );
        let reader = reader_for(Some(file.path().to_path_buf()), None);

        let entries = reader.read(now());
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.product_id.as_str() != "coins_pack_100"));
        assert_eq!(
            reader.current_status(),
            EntitlementStatus::ProUnlockedAndActiveSubscription {
                expires_at: Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
            }
        );
    }

    #[test]
    fn simulation_overrides_the_real_record() {
        let file = write_record(r#"{"in_app":[]}"#);
        let reader = reader_for(Some(file.path().to_path_buf()), Some(SimulationMode::Subscription));

        assert_eq!(
            reader.current_status(),
            EntitlementStatus::ActiveSubscription {
                expires_at: now() + Duration::days(1)
            }
        );
    }

    #[test]
    fn file_store_reports_absent_files_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileReceiptStore::at(dir.path().join(FileReceiptStore::FILE_NAME));
        assert_eq!(store.current_record_path(), None);

        std::fs::write(dir.path().join(FileReceiptStore::FILE_NAME), b"{}").unwrap();
        assert!(store.current_record_path().is_some());
    }

    #[test]
    fn refresh_publishes_even_when_unchanged() {
        let reader = reader_for(None, None);
        let cell = StatusCell::new(EntitlementStatus::NoPurchase);
        let sub = cell.subscribe_changes();

        reader.refresh_into(&cell);
        reader.refresh_into(&cell);

        assert_eq!(
            sub.drain(),
            vec![EntitlementStatus::NoPurchase, EntitlementStatus::NoPurchase]
        );
    }
}
