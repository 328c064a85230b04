use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts reported by a collaborator)
/// - **named** (stable type identifiers for logs)
/// - **timestamped** with the time they were observed
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "transaction.purchased").
    fn event_type(&self) -> &'static str;

    /// When the event was observed.
    fn occurred_at(&self) -> DateTime<Utc>;
}
