use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use duration_format::parse_duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub queue: QueueConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub project_id: String,
    pub subscription: String,
    #[serde(default = "default_pubsub_endpoint")]
    pub endpoint: String,
    /// Bearer token handed over by the credential provider
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_max_pull_batch_size")]
    pub max_pull_batch_size: usize,
    /// When false, a pull long-polls until messages arrive or the server deadline passes
    #[serde(default)]
    pub return_immediately: bool,
    #[serde(default = "default_queue_timeout", with = "duration_format")]
    pub timeout: Duration,
}

fn default_pubsub_endpoint() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_max_pull_batch_size() -> usize {
    1000
}

fn default_queue_timeout() -> Duration {
    Duration::from_secs(90)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub endpoint: String,
    /// Static headers added to every sink request (signing is done upstream)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_sink_timeout", with = "duration_format")]
    pub timeout: Duration,
}

fn default_sink_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_retention_window", with = "duration_format")]
    pub retention_window: Duration,
    #[serde(default = "default_stream_name")]
    pub default_stream_name: String,
    #[serde(default)]
    pub include_project_id: bool,
    #[serde(default = "default_resource_name_labels")]
    pub resource_name_labels: HashMap<String, String>,
    #[serde(default = "default_max_events_per_put")]
    pub max_events_per_put: usize,
    #[serde(default = "default_max_bytes_per_put")]
    pub max_bytes_per_put: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            retention_window: default_retention_window(),
            default_stream_name: default_stream_name(),
            include_project_id: false,
            resource_name_labels: default_resource_name_labels(),
            max_events_per_put: default_max_events_per_put(),
            max_bytes_per_put: default_max_bytes_per_put(),
        }
    }
}

fn default_retention_window() -> Duration {
    Duration::from_secs(23 * 3600)
}

fn default_stream_name() -> String {
    "default".to_string()
}

fn default_resource_name_labels() -> HashMap<String, String> {
    [
        ("cloud_function", "function_name"),
        ("gcs_bucket", "bucket_name"),
        ("gae_app", "module_id"),
        ("container", "container_name"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_max_events_per_put() -> usize {
    10_000
}

fn default_max_bytes_per_put() -> usize {
    1_048_576
}

// Custom serde module for duration parsing
mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Parse `500ms`, `30s`, `5m` or `23h`.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => return Err(format!("unknown unit: {}", unit)),
        };

        Ok(duration)
    }

    fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_millis() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }

}
