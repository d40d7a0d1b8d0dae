pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGRELAY CONFIGURATION
# =============================================================================
# logrelay pulls exported log entries from a Pub/Sub subscription and appends
# them to CloudWatch Logs, one log group per exporting resource.
#
# Values of the form $env{NAME} are replaced with environment variables before
# the file is parsed. Durations are written as 500ms, 30s, 5m or 23h.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logrelay/config.yml
#   3. /etc/logrelay/config.yml

# =============================================================================
# QUEUE
# =============================================================================
# The subscription entries are pulled from. Entries are acknowledged only after
# they have been written (or deliberately dropped as too old).

queue:
  project_id: my-gcp-project
  subscription: gcp-log-export
  endpoint: https://pubsub.googleapis.com
  # Bearer token used for pull/acknowledge requests
  access_token: $env{GCP_ACCESS_TOKEN}
  # Entries per pull; a full pull triggers another pull in the same cycle
  max_pull_batch_size: 1000
  # false: wait for messages instead of returning an empty pull right away
  return_immediately: false
  timeout: 90s

# =============================================================================
# SINK
# =============================================================================

sink:
  endpoint: https://logs.us-east-1.amazonaws.com
  # Static headers added to every request, e.g. from a signing proxy
  headers: {}
  timeout: 30s

# =============================================================================
# RELAY
# =============================================================================

relay:
  # Entries older than this (relative to processing time) are dropped
  retention_window: 23h
  default_stream_name: default
  # Prefix log groups with the project id: /gcp/<project>/<type>/<name>
  include_project_id: false
  # Resource label that names the log group, per resource type.
  # Types not listed fall back to function_name.
  resource_name_labels:
    cloud_function: function_name
    gcs_bucket: bucket_name
    gae_app: module_id
    container: container_name
  max_events_per_put: 10000
  max_bytes_per_put: 1048576
"#
    .to_string()
}
