use super::Sink;
use crate::errors::{IntoDiagnostic, Report, Result, SinkError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub(crate) struct Config {}

impl TryFrom<Config> for DebugSink {
    type Error = Report;

    fn try_from(_value: Config) -> Result<Self> {
        Ok(DebugSink::default())
    }
}

/// Echo records to the log, nothing is sent to an engine.
#[derive(Debug, Default)]
pub(crate) struct DebugSink {
    records: AtomicU64,
}

impl Sink for DebugSink {
    async fn submit(
        &self,
        data_source: &str,
        record_id: &str,
        payload: &str,
    ) -> std::result::Result<(), SinkError> {
        self.records.fetch_add(1, Ordering::Relaxed);
        tracing::info!(data_source, record_id, payload, "mock loading");
        Ok(())
    }

    async fn stats(&self) -> Result<String> {
        let records = self.records.load(Ordering::Relaxed);
        serde_json::to_string(&serde_json::json!({ "records": records })).into_diagnostic()
    }
}
