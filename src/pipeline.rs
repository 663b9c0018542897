//! Pipeline orchestration for stream-loader.
//!
//! Line inputs (stdin, file, url) flow through the bounded queue:
//! 1. **Sources**: read lines, enrich them and put them on the queue
//! 2. **Queue workers**: take entries from the queue and submit them to the sink
//! 3. **Monitor**: reports throughput and worker health every period
//!
//! Kafka input skips the queue, each consumer submits and commits by itself.
//!
//! The run ends when every source reached the end of its input and the workers
//! drained the queue, or on shutdown signal.

use crate::{
    config::Config,
    context::PipelineContext,
    enricher::Enricher,
    errors::{IntoDiagnostic, Result},
    monitor::Monitor,
    queue,
    sinks::{Sink, SinkEnum},
    sources::{self, Emitter, SourceKind},
    workers::{WorkerPool, drain_queue, join_all_tasks},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where the records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    Lines(SourceKind),
    #[cfg(feature = "source_kafka")]
    Kafka,
}

pub(crate) struct PipelineBuilder {
    config: Config,
    context: Arc<PipelineContext>,
}

impl PipelineBuilder {
    pub(crate) fn new(config: Config) -> Self {
        Self { config, context: Arc::new(PipelineContext::new()) }
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> Arc<PipelineContext> {
        Arc::clone(&self.context)
    }

    /// Create the configured sink, then run until the input is exhausted or a shutdown
    /// signal is received.
    pub(crate) async fn run(self, input: Input, shutdown_token: CancellationToken) -> Result<bool> {
        let signal_handler = tokio::spawn(handle_shutdown_signal(shutdown_token.clone()));
        let result = match SinkEnum::try_from(self.config.sink.clone()) {
            Ok(sink) => self.run_with_sink(input, Arc::new(sink), shutdown_token).await,
            Err(err) => Err(err),
        };
        signal_handler.abort();
        result
    }

    pub(crate) async fn run_with_sink(
        self,
        input: Input,
        sink: Arc<SinkEnum>,
        shutdown_token: CancellationToken,
    ) -> Result<bool> {
        tracing::info!(?input, pipeline = ?self.config.pipeline, "starting");
        let result = match input {
            Input::Lines(kind) => self.run_lines(&kind, &sink, &shutdown_token).await,
            #[cfg(feature = "source_kafka")]
            Input::Kafka => self.run_kafka(&sink, &shutdown_token).await,
        };
        sink.shutdown().await;
        if shutdown_token.is_cancelled() {
            tracing::info!(counters = ?self.context.snapshot(), "interrupted, exiting");
            return Ok(true);
        }
        result?;
        tracing::info!(counters = ?self.context.snapshot(), "completed");
        Ok(true)
    }

    fn enricher(&self) -> Arc<Enricher> {
        Arc::new(Enricher::new(
            self.config.input.data_source.clone(),
            self.config.input.entity_type.clone(),
        ))
    }

    async fn run_lines(
        &self,
        kind: &SourceKind,
        sink: &Arc<SinkEnum>,
        shutdown_token: &CancellationToken,
    ) -> Result<()> {
        let pipeline = &self.config.pipeline;
        let (tx, rx) = queue::bounded(pipeline.queue_max_size)?;
        let queue_depth = tx.depth();

        let workers = WorkerPool::spawn(
            "queue",
            (0..pipeline.output_workers).map(|_| {
                drain_queue(
                    rx.clone(),
                    Arc::clone(sink),
                    Arc::clone(&self.context),
                    shutdown_token.clone(),
                )
            }),
        );
        // only the workers may keep the queue open
        drop(rx);

        let emitter =
            Emitter::new(Arc::clone(&self.context), self.enricher(), tx, shutdown_token.clone());
        let source_handles = sources::start(kind, pipeline.input_workers, emitter);

        let monitor_token = shutdown_token.child_token();
        let monitor = Monitor::new(
            Arc::clone(&self.context),
            Arc::clone(sink),
            workers.liveness(),
            Some(queue_depth),
            pipeline.monitoring_period,
        );
        let monitor_handle = tokio::spawn(monitor.run(monitor_token.clone()));

        let sources_result = join_all_tasks(source_handles).await;
        let workers_result = workers.join().await;
        monitor_token.cancel();
        monitor_handle.await.into_diagnostic()??;
        sources_result.and(workers_result)
    }

    #[cfg(feature = "source_kafka")]
    async fn run_kafka(
        &self,
        sink: &Arc<SinkEnum>,
        shutdown_token: &CancellationToken,
    ) -> Result<()> {
        use crate::sources::kafka::{KafkaWorker, RdKafkaConsumer};

        let kafka = &self.config.kafka;
        let consumers = (0..self.config.pipeline.input_workers)
            .map(|_| RdKafkaConsumer::try_from(kafka))
            .collect::<Result<Vec<_>>>()?;
        let enricher = self.enricher();
        let workers = WorkerPool::spawn(
            "kafka",
            consumers.into_iter().map(|consumer| {
                KafkaWorker::new(
                    consumer,
                    Arc::clone(&enricher),
                    Arc::clone(&self.context),
                    Arc::clone(sink),
                    kafka.poll_timeout,
                )
                .run(shutdown_token.clone())
            }),
        );

        let monitor_token = shutdown_token.child_token();
        let monitor = Monitor::new(
            Arc::clone(&self.context),
            Arc::clone(sink),
            workers.liveness(),
            None,
            self.config.pipeline.monitoring_period,
        );
        let monitor_handle = tokio::spawn(monitor.run(monitor_token.clone()));

        let workers_result = workers.join().await;
        monitor_token.cancel();
        monitor_handle.await.into_diagnostic()??;
        workers_result
    }
}

#[allow(clippy::expect_used)]
pub(crate) async fn handle_shutdown_signal(shutdown_token: CancellationToken) {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
    shutdown_token.cancel();
}
