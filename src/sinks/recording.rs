use super::Sink;
use crate::errors::{Result, SinkError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Submitted {
    pub(crate) data_source: String,
    pub(crate) record_id: String,
    pub(crate) payload: String,
}

/// Keep every submitted record, answer with a scripted failure for some record ids.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    submitted: Mutex<Vec<Submitted>>,
    failures: HashMap<String, SinkError>,
    stats_calls: AtomicUsize,
}

impl RecordingSink {
    pub(crate) fn failing_on(record_id: &str, failure: SinkError) -> Self {
        Self { failures: HashMap::from([(record_id.to_string(), failure)]), ..Self::default() }
    }

    #[allow(clippy::unwrap_used)]
    pub(crate) fn submitted(&self) -> Vec<Submitted> {
        self.submitted.lock().unwrap().clone()
    }

    pub(crate) fn record_ids(&self) -> Vec<String> {
        self.submitted().into_iter().map(|s| s.record_id).collect()
    }

    pub(crate) fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::Relaxed)
    }
}

impl Sink for RecordingSink {
    #[allow(clippy::unwrap_used)]
    async fn submit(
        &self,
        data_source: &str,
        record_id: &str,
        payload: &str,
    ) -> std::result::Result<(), SinkError> {
        self.submitted.lock().unwrap().push(Submitted {
            data_source: data_source.to_string(),
            record_id: record_id.to_string(),
            payload: payload.to_string(),
        });
        match self.failures.get(record_id) {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    #[allow(clippy::unwrap_used)]
    async fn stats(&self) -> Result<String> {
        self.stats_calls.fetch_add(1, Ordering::Relaxed);
        Ok(format!("{{\"submitted\":{}}}", self.submitted.lock().unwrap().len()))
    }
}

impl super::SinkEnum {
    #[allow(clippy::panic)]
    pub(crate) fn recording(&self) -> &RecordingSink {
        match self {
            Self::RecordingSink(sink) => sink,
            _ => panic!("not a recording sink"),
        }
    }
}
