//! `kafka` subcommand: consume a topic, each consumer submits then commits.

use super::PipelineArgs;
use crate::{
    config::KafkaOverrides,
    errors::Result,
    pipeline::{Input, PipelineBuilder},
};
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Args)]
pub(crate) struct KafkaArgs {
    /// Kafka bootstrap servers (comma-separated).
    #[clap(long = "kafka-bootstrap-server", env("SENZING_KAFKA_BOOTSTRAP_SERVER"))]
    bootstrap_server: Option<String>,

    /// Consumer group shared by every consumer.
    #[clap(long = "kafka-group", env("SENZING_KAFKA_GROUP"))]
    group: Option<String>,

    #[clap(long = "kafka-topic", env("SENZING_KAFKA_TOPIC"))]
    topic: Option<String>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

pub(crate) async fn kafka(args: KafkaArgs, shutdown_token: CancellationToken) -> Result<bool> {
    let mut overrides = args.pipeline.overrides();
    overrides.kafka = KafkaOverrides {
        bootstrap_servers: args.bootstrap_server,
        group: args.group,
        topic: args.topic,
    };
    let config = args.pipeline.load_config(&overrides)?;
    PipelineBuilder::new(config).run(Input::Kafka, shutdown_token).await
}
