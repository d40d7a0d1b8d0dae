use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A log entry as exported by the upstream logging system.
///
/// Only the fields the relay reads are modelled; anything else in the
/// exported JSON is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogRecord {
    /// RFC 3339 timestamp of the original log line
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_payload: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_payload: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto_payload: Option<serde_json::Value>,

    #[serde(default)]
    pub resource: MonitoredResource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type", default)]
    pub resource_type: String,

    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl RawLogRecord {
    /// True if at least one payload field carries data worth relaying.
    pub fn has_message(&self) -> bool {
        self.text_payload.is_some() || self.json_payload.is_some() || self.proto_payload.is_some()
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.resource.labels.get(name).map(String::as_str)
    }
}

/// A record reduced to what the sink accepts: epoch millis and a message.
///
/// Serializes to the sink's `InputLogEvent` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedLogEntry {
    pub timestamp: i64,
    pub message: String,
}

impl NormalizedLogEntry {
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

/// The (log group, log stream) pair an entry is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DestinationKey {
    pub log_group: String,
    pub log_stream: String,
}

impl DestinationKey {
    pub fn new(log_group: impl Into<String>, log_stream: impl Into<String>) -> Self {
        Self {
            log_group: log_group.into(),
            log_stream: log_stream.into(),
        }
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.log_group, self.log_stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_exported_entry() {
        let json = r#"{
            "insertId": "000000-abc",
            "timestamp": "2026-10-19T12:00:00.123456789Z",
            "textPayload": "Function execution started",
            "severity": "DEBUG",
            "resource": {
                "type": "cloud_function",
                "labels": {"function_name": "ingest", "project_id": "demo", "region": "us-central1"}
            }
        }"#;

        let record: RawLogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.text_payload.as_deref(), Some("Function execution started"));
        assert_eq!(record.resource.resource_type, "cloud_function");
        assert_eq!(record.label("function_name"), Some("ingest"));
        assert!(record.has_message());
    }

    #[test]
    fn test_record_without_payload_has_no_message() {
        let json = r#"{"timestamp": "2026-10-19T12:00:00Z", "resource": {"type": "gce_instance"}}"#;
        let record: RawLogRecord = serde_json::from_str(json).unwrap();
        assert!(!record.has_message());
        assert!(record.resource.labels.is_empty());
    }

    #[test]
    fn test_null_payload_is_absent() {
        let json = r#"{"timestamp": "2026-10-19T12:00:00Z", "textPayload": null}"#;
        let record: RawLogRecord = serde_json::from_str(json).unwrap();
        assert!(!record.has_message());
    }

    #[test]
    fn test_destination_display() {
        let key = DestinationKey::new("/gcp/cloud_function/ingest", "default");
        assert_eq!(key.to_string(), "/gcp/cloud_function/ingest:default");
    }
}
