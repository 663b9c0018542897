pub(crate) mod debug;
#[cfg(feature = "sink_http")]
pub(crate) mod http;
#[cfg(test)]
pub(crate) mod recording;

use crate::errors::{Report, Result, SinkError};
use debug::DebugSink;
use enum_dispatch::enum_dispatch;
#[cfg(feature = "sink_http")]
use http::HttpSink;
#[cfg(test)]
use recording::RecordingSink;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub(crate) enum Config {
    #[serde(alias = "debug")]
    Debug(debug::Config),
    #[cfg(feature = "sink_http")]
    #[serde(alias = "http")]
    Http(http::Config),
}

impl Default for Config {
    fn default() -> Self {
        Self::Debug(debug::Config::default())
    }
}

impl TryFrom<Config> for SinkEnum {
    type Error = Report;

    fn try_from(value: Config) -> Result<Self> {
        let out = match value {
            Config::Debug(config) => DebugSink::try_from(config)?.into(),
            #[cfg(feature = "sink_http")]
            Config::Http(config) => HttpSink::try_from(config)?.into(),
        };
        Ok(out)
    }
}

#[enum_dispatch]
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub(crate) enum SinkEnum {
    DebugSink,
    #[cfg(feature = "sink_http")]
    HttpSink,
    #[cfg(test)]
    RecordingSink,
}

/// The resolution engine receiving the records.
///
/// A single instance is shared by every worker, calls can be concurrent.
#[enum_dispatch(SinkEnum)]
pub(crate) trait Sink {
    async fn submit(
        &self,
        data_source: &str,
        record_id: &str,
        payload: &str,
    ) -> std::result::Result<(), SinkError>;

    /// Engine statistics, usually a JSON document.
    async fn stats(&self) -> Result<String>;

    async fn shutdown(&self) {}
}
