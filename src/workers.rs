//! Queue workers and the submission of a record to the sink.

use crate::context::PipelineContext;
use crate::enricher::{DATA_SOURCE, RECORD_ID, parse_record};
use crate::errors::{Error, IntoDiagnostic, Result, SinkError};
use crate::queue::QueueReceiver;
use crate::sinks::{Sink, SinkEnum};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What happened to a record handed to [`submit_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Submission {
    Accepted,
    /// The engine refused the record.
    Rejected,
    /// The engine, or the way to reach it, failed.
    Failed,
    /// Not submitted: undecodable entry, or missing `DATA_SOURCE` / `RECORD_ID`.
    Malformed,
}

impl Submission {
    pub(crate) fn count(self, context: &PipelineContext) {
        match self {
            Self::Malformed => context.record_bad(),
            Self::Accepted | Self::Rejected | Self::Failed => context.record_processed(),
        }
    }
}

/// Send one queue entry to the sink. Never retried, failures are only logged.
pub(crate) async fn submit_record(sink: &SinkEnum, entry: &str) -> Submission {
    let record = match parse_record(entry) {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(?err, entry, "skipping malformed record");
            return Submission::Malformed;
        }
    };
    let (data_source, record_id) = match required_keys(&record) {
        Ok(keys) => keys,
        Err(err) => {
            tracing::warn!(?err, entry, "skipping record without identity");
            return Submission::Malformed;
        }
    };
    match sink.submit(data_source, record_id, entry).await {
        Ok(()) => {
            tracing::debug!(data_source, record_id, "record loaded");
            Submission::Accepted
        }
        Err(SinkError::Validation(reason)) => {
            tracing::error!(data_source, record_id, reason, payload = entry, "record rejected");
            Submission::Rejected
        }
        Err(SinkError::Engine(reason)) => {
            tracing::error!(data_source, record_id, reason, "engine failed to load record");
            Submission::Failed
        }
    }
}

fn required_keys(record: &Map<String, Value>) -> Result<(&str, &str)> {
    Ok((required_str(record, DATA_SOURCE)?, required_str(record, RECORD_ID)?))
}

fn required_str<'a>(record: &'a Map<String, Value>, key: &'static str) -> Result<&'a str> {
    record.get(key).and_then(Value::as_str).ok_or(Error::MissingField(key)).into_diagnostic()
}

/// Take entries from the queue until it is closed and drained, or until cancellation.
pub(crate) async fn drain_queue(
    queue: QueueReceiver,
    sink: Arc<SinkEnum>,
    context: Arc<PipelineContext>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::task::yield_now().await;
        let entry = tokio::select! {
            () = cancel_token.cancelled() => break,
            entry = queue.get() => entry,
        };
        let Some(entry) = entry else {
            break;
        };
        submit_record(&sink, &entry).await.count(&context);
    }
    Ok(())
}

/// Read-only view on whether a worker task is still running.
#[derive(Debug, Clone)]
pub(crate) struct WorkerLiveness(Arc<AtomicBool>);

impl WorkerLiveness {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Clears the liveness flag when the task ends, panics included.
struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<Result<()>>>,
    liveness: Vec<WorkerLiveness>,
}

impl WorkerPool {
    /// Spawn one task per worker future.
    pub(crate) fn spawn<Fut>(name: &'static str, workers: impl IntoIterator<Item = Fut>) -> Self
    where
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut handles = Vec::new();
        let mut liveness = Vec::new();
        for (index, worker) in workers.into_iter().enumerate() {
            let alive = Arc::new(AtomicBool::new(true));
            let guard = AliveGuard(Arc::clone(&alive));
            handles.push(tokio::spawn(async move {
                let _guard = guard;
                let result = worker.await;
                tracing::debug!(kind = "worker", name, index, "exiting");
                result
            }));
            liveness.push(WorkerLiveness(alive));
        }
        tracing::info!(kind = "worker", name, count = handles.len(), "started");
        Self { handles, liveness }
    }

    pub(crate) fn liveness(&self) -> Vec<WorkerLiveness> {
        self.liveness.clone()
    }

    /// Wait for every worker, then report the first failure.
    pub(crate) async fn join(self) -> Result<()> {
        join_all_tasks(self.handles).await
    }
}

/// Wait for every task to end, then return the first error (failure or panic).
pub(crate) async fn join_all_tasks(handles: Vec<JoinHandle<Result<()>>>) -> Result<()> {
    let mut first_error = None;
    for joined in futures::future::join_all(handles).await {
        let result = joined.into_diagnostic().and_then(|result| result);
        if let Err(err) = result {
            tracing::error!(?err, "task failed");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
