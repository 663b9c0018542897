use super::Sink;
use crate::errors::{IntoDiagnostic, Report, Result, SinkError};
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Config {
    /// Base url of the resolution engine api
    pub(crate) destination: Url,
}

impl TryFrom<Config> for HttpSink {
    type Error = Report;

    fn try_from(value: Config) -> Result<Self> {
        if value.destination.cannot_be_a_base() {
            return Err(crate::errors::Error::InvalidConfig(format!(
                "http sink destination can not be used as base url: {}",
                value.destination
            )))
            .into_diagnostic();
        }
        Ok(HttpSink::new(value.destination))
    }
}

/// Load records through the REST api of a remote resolution engine.
#[derive(Debug)]
pub(crate) struct HttpSink {
    client: ClientWithMiddleware,
    dest: Url,
}

impl HttpSink {
    pub(crate) fn new(url: Url) -> Self {
        let client = ClientBuilder::new(reqwest::Client::new())
            // Trace HTTP requests. See the tracing crate to make use of these traces.
            .with(TracingMiddleware::default())
            .build();
        Self { dest: url, client }
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.dest.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl Sink for HttpSink {
    async fn submit(
        &self,
        data_source: &str,
        record_id: &str,
        payload: &str,
    ) -> std::result::Result<(), SinkError> {
        let url = self.endpoint(&["data-sources", data_source, "records", record_id]);
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|err| SinkError::Engine(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let detail = if body.trim().is_empty() { status.to_string() } else { body };
        if status.is_client_error() {
            Err(SinkError::Validation(detail))
        } else {
            Err(SinkError::Engine(format!("http status {status}: {detail}")))
        }
    }

    async fn stats(&self) -> Result<String> {
        self.client
            .get(self.endpoint(&["stats"]))
            .send()
            .await
            .into_diagnostic()?
            .error_for_status()
            .into_diagnostic()?
            .text()
            .await
            .into_diagnostic()
    }
}
