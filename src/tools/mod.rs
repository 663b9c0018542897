#[cfg(feature = "source_kafka")]
pub(crate) mod kafka;
pub(crate) mod load;
pub(crate) mod sleep;

use crate::config::{Config, InputOverrides, Overrides, PipelineOverrides};
use crate::errors::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Options shared by the loading subcommands.
///
/// Every option also reads the environment variable named in its help.
#[derive(Debug, Clone, Args)]
pub(crate) struct PipelineArgs {
    /// The configuration file to use.
    #[clap(long = "config", env("STREAM_LOADER_CONFIG"))]
    config: Option<PathBuf>,

    /// Default `DATA_SOURCE` of records without one.
    #[clap(long = "data-source", env("SENZING_DATA_SOURCE"))]
    data_source: Option<String>,

    /// Default `ENTITY_TYPE` of records without one.
    #[clap(long = "entity-type", env("SENZING_ENTITY_TYPE"))]
    entity_type: Option<String>,

    /// Number of workers receiving input (stdin readers or kafka consumers).
    #[clap(long = "input-workers", env("SENZING_INPUT_WORKERS"))]
    input_workers: Option<usize>,

    /// Number of workers sending records to the engine.
    #[clap(long = "output-workers", env("SENZING_OUTPUT_WORKERS"))]
    output_workers: Option<usize>,

    /// Maximum number of records waiting in the internal queue.
    #[clap(long = "queue-max-size", env("SENZING_QUEUE_MAX"))]
    queue_max_size: Option<usize>,

    /// Period of the statistics report, in seconds.
    #[clap(long = "monitoring-period", env("SENZING_MONITORING_PERIOD"))]
    monitoring_period: Option<u64>,

    /// Base url of the resolution engine api. Selects the http sink.
    #[cfg(feature = "sink_http")]
    #[clap(long = "engine-url", env("SENZING_ENGINE_URL"))]
    engine_url: Option<url::Url>,
}

impl PipelineArgs {
    pub(crate) fn overrides(&self) -> Overrides {
        #[allow(unused_mut)]
        let mut overrides = Overrides {
            input: InputOverrides {
                url: None,
                data_source: self.data_source.clone(),
                entity_type: self.entity_type.clone(),
            },
            pipeline: PipelineOverrides {
                input_workers: self.input_workers,
                output_workers: self.output_workers,
                queue_max_size: self.queue_max_size,
                monitoring_period: self.monitoring_period.map(Duration::from_secs),
            },
            ..Overrides::default()
        };
        #[cfg(feature = "sink_http")]
        if let Some(destination) = &self.engine_url {
            overrides.sink = Some(crate::sinks::Config::Http(crate::sinks::http::Config {
                destination: destination.clone(),
            }));
        }
        overrides
    }

    pub(crate) fn load_config(&self, overrides: &Overrides) -> Result<Config> {
        Config::load(self.config.clone(), overrides)
    }
}
