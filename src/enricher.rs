//! Injection of default classification fields into JSON lines.
//!
//! The variant is chosen once at startup from the configured defaults. Without
//! any default, lines are forwarded without being decoded.

use crate::errors::{Error, IntoDiagnostic, Result};
use serde_json::{Map, Value};

pub(crate) const DATA_SOURCE: &str = "DATA_SOURCE";
pub(crate) const ENTITY_TYPE: &str = "ENTITY_TYPE";
pub(crate) const RECORD_ID: &str = "RECORD_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Enricher {
    Passthrough,
    DataSource(String),
    EntityType(String),
    Both { data_source: String, entity_type: String },
}

impl Enricher {
    pub(crate) fn new(data_source: Option<String>, entity_type: Option<String>) -> Self {
        match (data_source, entity_type) {
            (None, None) => Self::Passthrough,
            (Some(data_source), None) => Self::DataSource(data_source),
            (None, Some(entity_type)) => Self::EntityType(entity_type),
            (Some(data_source), Some(entity_type)) => Self::Both { data_source, entity_type },
        }
    }

    /// Returns the line to queue, with keys sorted when the line had to be decoded.
    pub(crate) fn enrich(&self, line: &str) -> Result<String> {
        match self {
            Self::Passthrough => Ok(line.trim().to_string()),
            Self::DataSource(data_source) => {
                let mut record = parse_record(line)?;
                insert_if_absent(&mut record, DATA_SOURCE, data_source);
                to_line(&record)
            }
            Self::EntityType(entity_type) => {
                let mut record = parse_record(line)?;
                insert_if_absent(&mut record, ENTITY_TYPE, entity_type);
                to_line(&record)
            }
            Self::Both { data_source, entity_type } => {
                let mut record = parse_record(line)?;
                insert_if_absent(&mut record, DATA_SOURCE, data_source);
                insert_if_absent(&mut record, ENTITY_TYPE, entity_type);
                to_line(&record)
            }
        }
    }

    /// Same as [`Enricher::enrich`] on an already decoded record (kafka path).
    pub(crate) fn enrich_record(&self, record: &mut Map<String, Value>) {
        match self {
            Self::Passthrough => {}
            Self::DataSource(data_source) => insert_if_absent(record, DATA_SOURCE, data_source),
            Self::EntityType(entity_type) => insert_if_absent(record, ENTITY_TYPE, entity_type),
            Self::Both { data_source, entity_type } => {
                insert_if_absent(record, DATA_SOURCE, data_source);
                insert_if_absent(record, ENTITY_TYPE, entity_type);
            }
        }
    }
}

/// Decode a line as a JSON object.
pub(crate) fn parse_record(line: &str) -> Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_str(line).map_err(|cause| Error::from_serde_error(line, cause))?;
    match value {
        Value::Object(record) => Ok(record),
        _ => Err(Error::NotAnObject).into_diagnostic(),
    }
}

/// `serde_json::Map` is ordered by key (no `preserve_order`), so the output is stable.
pub(crate) fn to_line(record: &Map<String, Value>) -> Result<String> {
    serde_json::to_string(record).into_diagnostic()
}

fn insert_if_absent(record: &mut Map<String, Value>, key: &str, value: &str) {
    if !record.contains_key(key) {
        record.insert(key.to_string(), Value::String(value.to_string()));
    }
}
