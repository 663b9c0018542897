use crate::{
    errors::{Error, IntoDiagnostic, Result},
    sinks,
};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub(crate) struct Config {
    #[serde(default)]
    pub(crate) input: InputConfig,
    #[serde(default)]
    pub(crate) pipeline: PipelineConfig,
    #[cfg(feature = "source_kafka")]
    #[serde(default)]
    pub(crate) kafka: crate::sources::kafka::config::Config,
    #[serde(default)]
    pub(crate) sink: sinks::Config,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
pub(crate) struct InputConfig {
    /// Where to read lines from: `file://`, `http(s)://` or a path. Stdin when absent.
    pub(crate) url: Option<String>,
    /// Injected as `DATA_SOURCE` into records without one
    pub(crate) data_source: Option<String>,
    /// Injected as `ENTITY_TYPE` into records without one
    pub(crate) entity_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub(crate) struct PipelineConfig {
    pub(crate) input_workers: usize,
    pub(crate) output_workers: usize,
    pub(crate) queue_max_size: usize,
    #[serde(with = "humantime_serde")]
    pub(crate) monitoring_period: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_workers: 3,
            output_workers: 3,
            queue_max_size: 10,
            monitoring_period: Duration::from_secs(300),
        }
    }
}

/// Values set from the command line, applied last. `None` leaves the value untouched.
#[derive(Clone, Debug, Serialize, Default)]
pub(crate) struct Overrides {
    pub(crate) input: InputOverrides,
    pub(crate) pipeline: PipelineOverrides,
    pub(crate) kafka: KafkaOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sink: Option<sinks::Config>,
}

#[derive(Clone, Debug, Serialize, Default)]
pub(crate) struct InputOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) entity_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Default)]
pub(crate) struct PipelineOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) input_workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) output_workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) queue_max_size: Option<usize>,
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub(crate) monitoring_period: Option<Duration>,
}

#[derive(Clone, Debug, Serialize, Default)]
pub(crate) struct KafkaOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) bootstrap_servers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) topic: Option<String>,
}

impl Config {
    /// Layers, last wins: built-in base, config file, `STREAM_LOADER__*` env, command line.
    pub(crate) fn load(config_file: Option<PathBuf>, overrides: &Overrides) -> Result<Self> {
        if let Some(ref config_file) = config_file {
            if !config_file.exists() {
                return Err(Error::ConfigNotFound {
                    path: config_file.to_string_lossy().to_string(),
                })
                .into_diagnostic();
            }
        }
        let config_file_base = include_str!("../assets/stream-loader.base.toml");

        let mut figment = Figment::new().merge(Toml::string(config_file_base));
        if let Some(config_file) = config_file {
            figment = figment.merge(Toml::file(config_file.as_path()));
        }
        let config: Config = figment
            .merge(Env::prefixed("STREAM_LOADER__").split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()
            .into_diagnostic()?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let pipeline = &self.pipeline;
        let problem = if pipeline.input_workers == 0 {
            Some("pipeline.input_workers must be at least 1")
        } else if pipeline.output_workers == 0 {
            Some("pipeline.output_workers must be at least 1")
        } else if pipeline.queue_max_size == 0 {
            Some("pipeline.queue_max_size must be at least 1")
        } else if pipeline.monitoring_period.is_zero() {
            Some("pipeline.monitoring_period must not be zero")
        } else {
            None
        };
        match problem {
            Some(problem) => Err(Error::InvalidConfig(problem.to_string())).into_diagnostic(),
            None => Ok(()),
        }
    }
}
