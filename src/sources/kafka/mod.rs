pub(crate) mod config;

use crate::context::PipelineContext;
use crate::enricher::{Enricher, parse_record, to_line};
use crate::errors::{IntoDiagnostic, Result};
use crate::sinks::SinkEnum;
use crate::workers::submit_record;
use config::Config;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A message read from the broker, detached from the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BrokerMessage {
    pub(crate) topic: String,
    pub(crate) partition: i32,
    pub(crate) offset: i64,
    pub(crate) payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollError {
    /// Nothing more to read on a partition for now.
    EndOfPartition,
    Fatal(String),
}

/// The part of a broker client used by [`KafkaWorker`].
pub(crate) trait RecordConsumer {
    /// `Ok(None)` when no message arrived within `timeout`.
    async fn poll(&self, timeout: Duration) -> std::result::Result<Option<BrokerMessage>, PollError>;

    /// Commit the position right after `message`, synchronously.
    fn commit(&self, message: &BrokerMessage) -> Result<()>;
}

pub(crate) struct RdKafkaConsumer {
    consumer: StreamConsumer,
}

impl RdKafkaConsumer {
    /// must be called from the context of a Tokio 1.x runtime
    pub(crate) fn try_from(config: &Config) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.client_properties() {
            client_config.set(key, value);
        }
        let consumer: StreamConsumer = client_config.create().into_diagnostic()?;
        consumer.subscribe(&[config.topic.as_str()]).into_diagnostic()?;
        Ok(Self { consumer })
    }
}

impl RecordConsumer for RdKafkaConsumer {
    async fn poll(&self, timeout: Duration) -> std::result::Result<Option<BrokerMessage>, PollError> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(message)) => Ok(Some(BrokerMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                payload: message.payload().map(<[u8]>::to_vec),
            })),
            Ok(Err(KafkaError::PartitionEOF(_))) => Err(PollError::EndOfPartition),
            Ok(Err(err)) => Err(PollError::Fatal(err.to_string())),
        }
    }

    /// Blocks until the broker acknowledges, requires the multi-thread runtime.
    fn commit(&self, message: &BrokerMessage) -> Result<()> {
        let mut positions = TopicPartitionList::new();
        positions
            .add_partition_offset(&message.topic, message.partition, Offset::Offset(message.offset + 1))
            .into_diagnostic()?;
        tokio::task::block_in_place(|| {
            self.consumer.commit(&positions, CommitMode::Sync).into_diagnostic()
        })
    }
}

/// Consume, enrich, submit then commit, one message at a time.
///
/// Delivery is at-least-once: the offset is committed once the sink has been called,
/// whatever its answer.
pub(crate) struct KafkaWorker<C> {
    consumer: C,
    enricher: Arc<Enricher>,
    context: Arc<PipelineContext>,
    sink: Arc<SinkEnum>,
    poll_timeout: Duration,
}

impl<C: RecordConsumer> KafkaWorker<C> {
    pub(crate) fn new(
        consumer: C,
        enricher: Arc<Enricher>,
        context: Arc<PipelineContext>,
        sink: Arc<SinkEnum>,
        poll_timeout: Duration,
    ) -> Self {
        Self { consumer, enricher, context, sink, poll_timeout }
    }

    #[tracing::instrument(skip(self, cancel_token))]
    pub(crate) async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        tracing::info!(kind = "source", "kafka consumer starting");
        loop {
            tokio::task::yield_now().await;
            let polled = tokio::select! {
                () = cancel_token.cancelled() => break,
                polled = self.consumer.poll(self.poll_timeout) => polled,
            };
            match polled {
                Ok(None) | Err(PollError::EndOfPartition) => {}
                Err(PollError::Fatal(reason)) => {
                    tracing::error!(reason, "kafka poll failed, stopping consumer");
                    break;
                }
                Ok(Some(message)) => self.process(&message).await,
            }
        }
        tracing::info!(kind = "source", "kafka consumer exiting");
        Ok(())
    }

    #[tracing::instrument(skip(self, message), fields(
        kafka_topic = %message.topic,
        kafka_partition = %message.partition,
        kafka_offset = %message.offset
    ))]
    async fn process(&self, message: &BrokerMessage) {
        let Some(payload) = message.payload.as_deref() else {
            tracing::debug!("received kafka message with no payload, skipping");
            return;
        };
        let body = std::str::from_utf8(payload).map(str::trim).into_diagnostic();
        if matches!(body, Ok(body) if body.is_empty()) {
            return;
        }
        self.context.record_queued();

        let line = body.and_then(parse_record).and_then(|mut record| {
            self.enricher.enrich_record(&mut record);
            to_line(&record)
        });
        match line {
            Ok(line) => submit_record(&self.sink, &line).await.count(&self.context),
            Err(err) => {
                tracing::warn!(?err, "failed to parse kafka message as a json object");
                self.context.record_bad();
            }
        }
        if let Err(err) = self.consumer.commit(message) {
            tracing::error!(?err, "failed to commit kafka offset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::miette;
    use crate::sinks::recording::RecordingSink;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a list of poll results, then reports a fatal error.
    #[derive(Default)]
    struct ScriptedConsumer {
        script: Mutex<VecDeque<std::result::Result<Option<BrokerMessage>, PollError>>>,
        committed: Mutex<Vec<(i32, i64)>>,
        failing_commit: bool,
    }

    impl ScriptedConsumer {
        fn new(
            script: impl IntoIterator<Item = std::result::Result<Option<BrokerMessage>, PollError>>,
        ) -> Self {
            Self { script: Mutex::new(script.into_iter().collect()), ..Self::default() }
        }

        fn committed(&self) -> Vec<(i32, i64)> {
            self.committed.lock().unwrap().clone()
        }
    }

    impl RecordConsumer for &ScriptedConsumer {
        async fn poll(
            &self,
            _timeout: Duration,
        ) -> std::result::Result<Option<BrokerMessage>, PollError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PollError::Fatal("end of script".into())))
        }

        fn commit(&self, message: &BrokerMessage) -> Result<()> {
            if self.failing_commit {
                return Err(miette!("commit refused"));
            }
            self.committed.lock().unwrap().push((message.partition, message.offset));
            Ok(())
        }
    }

    fn message(offset: i64, payload: &str) -> std::result::Result<Option<BrokerMessage>, PollError> {
        Ok(Some(BrokerMessage {
            topic: "senzing-kafka-topic".into(),
            partition: 0,
            offset,
            payload: Some(payload.as_bytes().to_vec()),
        }))
    }

    async fn run_script(
        consumer: &ScriptedConsumer,
        enricher: Enricher,
    ) -> (Arc<SinkEnum>, Arc<PipelineContext>) {
        let sink = Arc::new(SinkEnum::from(RecordingSink::default()));
        let context = Arc::new(PipelineContext::new());
        let worker = KafkaWorker::new(
            consumer,
            Arc::new(enricher),
            Arc::clone(&context),
            Arc::clone(&sink),
            Duration::from_millis(10),
        );
        worker.run(CancellationToken::new()).await.unwrap();
        (sink, context)
    }

    #[tokio::test]
    async fn malformed_message_is_committed_without_submit() {
        let consumer = ScriptedConsumer::new([message(7, "not-json")]);
        let (sink, context) = run_script(&consumer, Enricher::Passthrough).await;
        assert!(sink.recording().submitted().is_empty());
        assert_eq!(consumer.committed(), vec![(0, 7)]);
        let counters = context.snapshot();
        assert_eq!(counters.queued, 1);
        assert_eq!(counters.processed, 0);
        assert_eq!(counters.bad, 1);
    }

    #[tokio::test]
    async fn message_is_enriched_submitted_then_committed() {
        let consumer = ScriptedConsumer::new([
            Ok(None),
            Err(PollError::EndOfPartition),
            message(1, r#"{"RECORD_ID":"1"}"#),
            message(2, r#"{"RECORD_ID":"2","DATA_SOURCE":"OWN"}"#),
        ]);
        let enricher = Enricher::new(Some("D".into()), Some("PERSON".into()));
        let (sink, context) = run_script(&consumer, enricher).await;
        let submitted = sink.recording().submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].payload, r#"{"DATA_SOURCE":"D","ENTITY_TYPE":"PERSON","RECORD_ID":"1"}"#);
        assert_eq!(submitted[1].data_source, "OWN");
        assert_eq!(consumer.committed(), vec![(0, 1), (0, 2)]);
        assert_eq!(context.snapshot().processed, 2);
    }

    #[tokio::test]
    async fn absent_defaults_are_not_inserted() {
        let consumer = ScriptedConsumer::new([message(1, r#"{"DATA_SOURCE":"D","RECORD_ID":"1"}"#)]);
        let (sink, _context) = run_script(&consumer, Enricher::Passthrough).await;
        assert_eq!(sink.recording().submitted()[0].payload, r#"{"DATA_SOURCE":"D","RECORD_ID":"1"}"#);
    }

    #[tokio::test]
    async fn invalid_utf8_message_is_bad_and_committed() {
        let consumer = ScriptedConsumer::new([
            Ok(Some(BrokerMessage {
                topic: "senzing-kafka-topic".into(),
                partition: 0,
                offset: 3,
                payload: Some(b"{\"DATA_SOURCE\":\"D\",\"RECORD_ID\":\"\xff\"}".to_vec()),
            })),
            message(4, r#"{"DATA_SOURCE":"D","RECORD_ID":"4"}"#),
        ]);
        let (sink, context) = run_script(&consumer, Enricher::Passthrough).await;
        assert_eq!(sink.recording().record_ids(), vec!["4"]);
        assert_eq!(consumer.committed(), vec![(0, 3), (0, 4)]);
        let counters = context.snapshot();
        assert_eq!(counters.queued, 2);
        assert_eq!(counters.bad, 1);
        assert_eq!(counters.processed, 1);
    }

    #[tokio::test]
    async fn empty_message_is_neither_counted_nor_committed() {
        let consumer = ScriptedConsumer::new([
            message(1, "   "),
            Ok(Some(BrokerMessage {
                topic: "t".into(),
                partition: 0,
                offset: 2,
                payload: None,
            })),
        ]);
        let (_sink, context) = run_script(&consumer, Enricher::Passthrough).await;
        assert!(consumer.committed().is_empty());
        assert_eq!(context.snapshot().queued, 0);
    }

    #[tokio::test]
    async fn failed_commit_does_not_stop_the_loop() {
        let consumer = ScriptedConsumer {
            failing_commit: true,
            ..ScriptedConsumer::new([
                message(1, r#"{"DATA_SOURCE":"D","RECORD_ID":"1"}"#),
                message(2, r#"{"DATA_SOURCE":"D","RECORD_ID":"2"}"#),
            ])
        };
        let (sink, _context) = run_script(&consumer, Enricher::Passthrough).await;
        assert_eq!(sink.recording().record_ids(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let consumer = ScriptedConsumer::new(std::iter::repeat_with(|| Ok(None)).take(10_000));
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();
        let worker = KafkaWorker::new(
            &consumer,
            Arc::new(Enricher::Passthrough),
            Arc::new(PipelineContext::new()),
            Arc::new(SinkEnum::from(RecordingSink::default())),
            Duration::from_millis(10),
        );
        worker.run(cancel_token).await.unwrap();
        assert!(!consumer.script.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn consumer_creation_does_not_connect() {
        let config = Config { bootstrap_servers: "localhost:9092,localhost:9093".into(), ..Config::default() };
        assert!(RdKafkaConsumer::try_from(&config).is_ok());
    }
}
