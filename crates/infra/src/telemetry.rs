//! Telemetry sink that forwards reports to the tracing pipeline.

use tracing::error;

use crate::ports::TelemetrySink;

/// Reports errors as `error`-level tracing events with the `telemetry` target.
///
/// Whatever subscriber the process installed decides where they go.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn report(&self, err: &(dyn std::error::Error + 'static)) {
        let source = err.source().map(|s| s.to_string());
        error!(target: "telemetry", error = %err, source = ?source, "reported error");
    }
}
