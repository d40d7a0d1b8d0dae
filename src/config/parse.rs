use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// The sink refuses batches spanning more than a day.
const MAX_RETENTION_WINDOW: Duration = Duration::from_secs(24 * 3600);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    load_config_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(err) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), err),
        )),
        other => other,
    })
}

/// Parse and validate config from a YAML string, expanding `$env{VAR}` first.
pub fn load_config_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let config: Config = serde_yaml::from_str(&yaml_string)?;
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.queue.project_id.trim().is_empty() {
        errors.push("queue.project_id must not be empty".to_string());
    }
    if config.queue.subscription.trim().is_empty() {
        errors.push("queue.subscription must not be empty".to_string());
    }
    if config.queue.endpoint.trim().is_empty() {
        errors.push("queue.endpoint must not be empty".to_string());
    }
    if config.queue.max_pull_batch_size == 0 {
        errors.push("queue.max_pull_batch_size must be at least 1".to_string());
    }

    if config.sink.endpoint.trim().is_empty() {
        errors.push("sink.endpoint must not be empty".to_string());
    }

    let relay = &config.relay;
    if relay.retention_window.is_zero() {
        errors.push("relay.retention_window must be greater than zero".to_string());
    } else if relay.retention_window > MAX_RETENTION_WINDOW {
        errors.push(format!(
            "relay.retention_window must not exceed 24h (got {}s)",
            relay.retention_window.as_secs()
        ));
    }
    if relay.default_stream_name.trim().is_empty() {
        errors.push("relay.default_stream_name must not be empty".to_string());
    }
    if relay.max_events_per_put == 0 {
        errors.push("relay.max_events_per_put must be at least 1".to_string());
    }
    if relay.max_bytes_per_put == 0 {
        errors.push("relay.max_bytes_per_put must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
