//! Periodic throughput and health report.

use crate::context::{CounterValues, PipelineContext};
use crate::errors::Result;
use crate::queue::QueueDepth;
use crate::sinks::{Sink, SinkEnum};
use crate::workers::WorkerLiveness;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Counters read at a given time since start.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Sample {
    pub(crate) counters: CounterValues,
    pub(crate) uptime: Duration,
}

/// Content of one status report. Fields are declared in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct MonitorSnapshot {
    pub(crate) bad_records: u64,
    pub(crate) processed_records: u64,
    pub(crate) queue_size: usize,
    pub(crate) queued_records: u64,
    pub(crate) rate_processed_interval: u64,
    pub(crate) rate_processed_total: u64,
    pub(crate) rate_queued_interval: u64,
    pub(crate) rate_queued_total: u64,
    pub(crate) uptime: u64,
    pub(crate) workers_active: usize,
    pub(crate) workers_total: usize,
}

impl MonitorSnapshot {
    pub(crate) fn compute(
        previous: &Sample,
        current: &Sample,
        queue_size: usize,
        workers_active: usize,
        workers_total: usize,
    ) -> Self {
        let interval = current.uptime.saturating_sub(previous.uptime);
        let counters = &current.counters;
        Self {
            bad_records: counters.bad,
            processed_records: counters.processed,
            queue_size,
            queued_records: counters.queued,
            rate_processed_interval: rate(
                counters.processed.saturating_sub(previous.counters.processed),
                interval,
            ),
            rate_processed_total: rate(counters.processed, current.uptime),
            rate_queued_interval: rate(
                counters.queued.saturating_sub(previous.counters.queued),
                interval,
            ),
            rate_queued_total: rate(counters.queued, current.uptime),
            uptime: current.uptime.as_secs(),
            workers_active,
            workers_total,
        }
    }

    pub(crate) fn is_starving(&self) -> bool {
        is_starving(self.workers_active, self.workers_total)
    }
}

/// Records per second, truncated. 0 when no time elapsed.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rate(count: u64, elapsed: Duration) -> u64 {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 { 0 } else { (count as f64 / seconds) as u64 }
}

/// Less than half of the workers are still alive.
pub(crate) fn is_starving(alive: usize, total: usize) -> bool {
    total > 0 && alive * 2 < total
}

pub(crate) struct Monitor {
    context: Arc<PipelineContext>,
    sink: Arc<SinkEnum>,
    workers: Vec<WorkerLiveness>,
    queue_depth: Option<QueueDepth>,
    period: Duration,
}

impl Monitor {
    pub(crate) fn new(
        context: Arc<PipelineContext>,
        sink: Arc<SinkEnum>,
        workers: Vec<WorkerLiveness>,
        queue_depth: Option<QueueDepth>,
        period: Duration,
    ) -> Self {
        Self { context, sink, workers, queue_depth, period }
    }

    /// Report every period until cancelled.
    #[tracing::instrument(skip(self, cancel_token), fields(period = ?self.period))]
    pub(crate) async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        let mut interval = tokio::time::interval(self.period);
        // the first tick completes immediately
        interval.tick().await;
        let mut previous = self.sample(Instant::now());
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                tick = interval.tick() => {
                    let current = self.sample(tick.into_std());
                    self.report(&previous, &current).await;
                    previous = current;
                }
            }
        }
        tracing::debug!(kind = "monitor", "exiting");
        Ok(())
    }

    fn sample(&self, now: Instant) -> Sample {
        Sample {
            counters: self.context.snapshot(),
            uptime: now.saturating_duration_since(self.context.started_at()),
        }
    }

    async fn report(&self, previous: &Sample, current: &Sample) {
        let workers_active = self.workers.iter().filter(|worker| worker.is_alive()).count();
        let snapshot = MonitorSnapshot::compute(
            previous,
            current,
            self.queue_depth.as_ref().map_or(0, QueueDepth::get),
            workers_active,
            self.workers.len(),
        );
        if snapshot.is_starving() {
            tracing::warn!(
                workers_active = snapshot.workers_active,
                workers_total = snapshot.workers_total,
                "running low on workers"
            );
        }
        match serde_json::to_string(&snapshot) {
            Ok(stats) => tracing::info!(stats, "pipeline statistics"),
            Err(err) => tracing::warn!(?err, "failed to serialize pipeline statistics"),
        }
        match self.sink.stats().await {
            Ok(stats) => tracing::info!(stats = sorted_json(&stats), "engine statistics"),
            Err(err) => tracing::warn!(?err, "failed to read engine statistics"),
        }
    }
}

/// Re-serialize a JSON document with sorted keys, other text is returned as is.
fn sorted_json(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .and_then(|value| serde_json::to_string(&value))
        .unwrap_or_else(|_| text.to_string())
}
