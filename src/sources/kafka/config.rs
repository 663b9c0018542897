//! Configuration of the Kafka consumers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Config {
    /// Kafka broker addresses (comma-separated)
    pub(crate) bootstrap_servers: String,
    /// Consumer group shared by every consumer of the process
    pub(crate) group: String,
    pub(crate) topic: String,
    /// Polling timeout for consumer (default: 1s)
    #[serde(with = "humantime_serde", default = "default_poll_timeout")]
    pub(crate) poll_timeout: Duration,
    /// Consumer configuration options
    /// see <https://docs.confluent.io/platform/current/clients/librdkafka/html/md_CONFIGURATION.html>
    #[allow(clippy::struct_field_names)]
    #[serde(default)]
    pub(crate) rdkafka_config: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            group: "senzing-kafka-group".to_string(),
            topic: "senzing-kafka-topic".to_string(),
            poll_timeout: default_poll_timeout(),
            rdkafka_config: HashMap::new(),
        }
    }
}

pub(super) fn default_poll_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Config {
    /// Consumer properties: `rdkafka_config` first, then defaults for what it leaves unset.
    /// Offsets are always committed by the loader.
    pub(crate) fn client_properties(&self) -> Vec<(String, String)> {
        let mut properties = self
            .rdkafka_config
            .iter()
            .filter(|(key, _)| key.as_str() != "enable.auto.commit")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Vec<_>>();
        let defaults = [
            ("bootstrap.servers", self.bootstrap_servers.as_str()),
            ("group.id", self.group.as_str()),
            ("auto.offset.reset", "earliest"),
            ("enable.partition.eof", "false"),
        ];
        for (key, value) in defaults {
            if !self.rdkafka_config.contains_key(key) {
                properties.push((key.to_string(), value.to_string()));
            }
        }
        properties.push(("enable.auto.commit".to_string(), "false".to_string()));
        properties.sort();
        properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn property<'a>(properties: &'a [(String, String)], key: &str) -> Option<&'a str> {
        properties.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_poll_timeout(), Duration::from_secs(1));
        let properties = Config::default().client_properties();
        assert_eq!(property(&properties, "bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(property(&properties, "group.id"), Some("senzing-kafka-group"));
        assert_eq!(property(&properties, "auto.offset.reset"), Some("earliest"));
        assert_eq!(property(&properties, "enable.auto.commit"), Some("false"));
    }

    #[test]
    fn rdkafka_config_wins_except_for_auto_commit() {
        let config = Config {
            rdkafka_config: HashMap::from([
                ("auto.offset.reset".to_string(), "latest".to_string()),
                ("enable.auto.commit".to_string(), "true".to_string()),
                ("session.timeout.ms".to_string(), "10000".to_string()),
            ]),
            ..Config::default()
        };
        let properties = config.client_properties();
        assert_eq!(property(&properties, "auto.offset.reset"), Some("latest"));
        assert_eq!(property(&properties, "enable.auto.commit"), Some("false"));
        assert_eq!(property(&properties, "session.timeout.ms"), Some("10000"));
        assert_eq!(properties.iter().filter(|(k, _)| k == "enable.auto.commit").count(), 1);
    }

    #[test]
    fn poll_timeout_is_a_humantime_duration() {
        let config: Config = toml::from_str(indoc::indoc! {r#"
            bootstrap_servers = "kafka:9092"
            group = "g"
            topic = "t"
            poll_timeout = "250ms"
        "#})
        .unwrap();
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
    }
}
