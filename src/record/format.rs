use crate::config::types::RelayConfig;
use crate::record::types::{DestinationKey, NormalizedLogEntry, RawLogRecord};
use chrono::DateTime;
use std::collections::HashMap;
use thiserror::Error;

/// Label consulted when a resource type has no entry in the label map.
const FALLBACK_NAME_LABEL: &str = "function_name";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("record has no message data")]
    NoMessageData,

    #[error("failed to parse timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Maps raw records to their destination and to the sink's entry shape.
///
/// Both operations are pure functions of the record.
#[derive(Debug, Clone)]
pub struct EntryFormatter {
    default_stream_name: String,
    include_project_id: bool,
    resource_name_labels: HashMap<String, String>,
}

impl EntryFormatter {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            default_stream_name: config.default_stream_name.clone(),
            include_project_id: config.include_project_id,
            resource_name_labels: config.resource_name_labels.clone(),
        }
    }

    /// Destination for a record: `/gcp/<type>/<name>` plus the configured stream.
    pub fn route(&self, record: &RawLogRecord) -> DestinationKey {
        let resource_type = &record.resource.resource_type;
        let name_label = self
            .resource_name_labels
            .get(resource_type)
            .map(String::as_str)
            .unwrap_or(FALLBACK_NAME_LABEL);

        let mut log_group = String::from("/gcp");
        if self.include_project_id {
            if let Some(project_id) = record.label("project_id") {
                log_group.push('/');
                log_group.push_str(project_id);
            }
        }
        log_group.push('/');
        log_group.push_str(resource_type);
        if let Some(name) = record.label(name_label) {
            log_group.push('/');
            log_group.push_str(name);
        }

        DestinationKey::new(log_group, self.stream_name(record))
    }

    /// Every record of a group currently lands in the configured stream.
    fn stream_name(&self, _record: &RawLogRecord) -> String {
        self.default_stream_name.clone()
    }

    /// Normalize a record. Callers filter records without a message first.
    pub fn format(&self, record: &RawLogRecord) -> Result<NormalizedLogEntry, FormatError> {
        let message = message_of(record).ok_or(FormatError::NoMessageData)?;
        let timestamp = parse_timestamp_millis(&record.timestamp)?;
        Ok(NormalizedLogEntry { timestamp, message })
    }
}

/// Text payload if present, else the JSON payload, else the proto payload.
pub fn message_of(record: &RawLogRecord) -> Option<String> {
    if let Some(text) = &record.text_payload {
        return Some(text.clone());
    }
    record
        .json_payload
        .as_ref()
        .or(record.proto_payload.as_ref())
        .map(render_payload)
}

fn render_payload(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse an RFC 3339 timestamp into epoch milliseconds.
pub fn parse_timestamp_millis(value: &str) -> Result<i64, FormatError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|source| FormatError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::types::MonitoredResource;
    use serde_json::json;

    fn formatter() -> EntryFormatter {
        EntryFormatter::new(&RelayConfig::default())
    }

    fn record(resource_type: &str, labels: &[(&str, &str)]) -> RawLogRecord {
        RawLogRecord {
            timestamp: "2026-10-19T12:00:00Z".to_string(),
            text_payload: Some("hello".to_string()),
            json_payload: None,
            proto_payload: None,
            resource: MonitoredResource {
                resource_type: resource_type.to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }

    #[test]
    fn test_route_cloud_function() {
        let rec = record("cloud_function", &[("function_name", "ingest"), ("project_id", "demo")]);
        let key = formatter().route(&rec);
        assert_eq!(key.log_group, "/gcp/cloud_function/ingest");
        assert_eq!(key.log_stream, "default");
    }

    #[test]
    fn test_route_uses_resource_name_label_map() {
        let rec = record("gcs_bucket", &[("bucket_name", "uploads")]);
        assert_eq!(formatter().route(&rec).log_group, "/gcp/gcs_bucket/uploads");

        let rec = record("gae_app", &[("module_id", "api"), ("function_name", "ignored")]);
        assert_eq!(formatter().route(&rec).log_group, "/gcp/gae_app/api");
    }

    #[test]
    fn test_route_unmapped_type_falls_back_to_function_name() {
        let rec = record("cloud_run_job", &[("function_name", "nightly")]);
        assert_eq!(formatter().route(&rec).log_group, "/gcp/cloud_run_job/nightly");
    }

    #[test]
    fn test_route_without_name_label() {
        let rec = record("gce_instance", &[("instance_id", "123")]);
        assert_eq!(formatter().route(&rec).log_group, "/gcp/gce_instance");
    }

    #[test]
    fn test_route_with_project_id() {
        let config = RelayConfig {
            include_project_id: true,
            default_stream_name: "main".to_string(),
            ..RelayConfig::default()
        };
        let rec = record("cloud_function", &[("function_name", "ingest"), ("project_id", "demo")]);
        let key = EntryFormatter::new(&config).route(&rec);
        assert_eq!(key.log_group, "/gcp/demo/cloud_function/ingest");
        assert_eq!(key.log_stream, "main");
    }

    #[test]
    fn test_format_text_payload() {
        let rec = record("cloud_function", &[("function_name", "ingest")]);
        let entry = formatter().format(&rec).unwrap();
        assert_eq!(entry.message, "hello");
        assert_eq!(entry.timestamp, 1_792_411_200_000);
    }

    #[test]
    fn test_message_precedence() {
        let mut rec = record("cloud_function", &[]);
        rec.json_payload = Some(json!({"level": "info"}));
        rec.proto_payload = Some(json!({"@type": "audit"}));
        assert_eq!(message_of(&rec).as_deref(), Some("hello"));

        rec.text_payload = None;
        assert_eq!(message_of(&rec).as_deref(), Some(r#"{"level":"info"}"#));

        rec.json_payload = None;
        assert_eq!(message_of(&rec).as_deref(), Some(r#"{"@type":"audit"}"#));

        rec.proto_payload = None;
        assert!(message_of(&rec).is_none());
        assert!(matches!(formatter().format(&rec), Err(FormatError::NoMessageData)));
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp_millis("1970-01-01T00:00:01Z").unwrap(), 1000);
        assert_eq!(
            parse_timestamp_millis("1970-01-01T00:00:01.999999999Z").unwrap(),
            1999
        );
        assert_eq!(parse_timestamp_millis("1970-01-01T01:00:00+01:00").unwrap(), 0);
        assert!(parse_timestamp_millis("yesterday").is_err());
    }
}
