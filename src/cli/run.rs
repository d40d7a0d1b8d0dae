use crate::config::parse::load_config;
use crate::config::parse_duration;
use crate::config::types::Config;
use crate::pipeline::relay::relay_once;
use crate::queue::client::PubSubClient;
use crate::sink::cloudwatch::CloudWatchLogsClient;
use crate::sink::token_cache::SequenceTokenCache;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::signal;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config not found in ~/.config/logrelay/config.yml or /etc/logrelay/config.yml; use --config <path> or run 'logrelay config init'")]
    ConfigNotFound,

    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("queue error: {0}")]
    Queue(#[from] crate::queue::client::QueueError),

    #[error("sink error: {0}")]
    Sink(#[from] crate::sink::traits::SinkError),

    #[error("relay error: {0}")]
    Relay(#[from] crate::queue::consumer::ConsumerError),
}

/// Parse the pause between cycles; a zero pause is rejected.
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let interval = parse_duration(s)?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

pub async fn run(
    config_path: Option<PathBuf>,
    interval: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path.ok_or(RunError::ConfigNotFound)?;
    run_relay(&config_path, interval).await.map_err(|e| e.into())
}

async fn run_relay(config_path: &Path, interval: Option<Duration>) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let queue = PubSubClient::new(&config.queue)?;
    let sink = CloudWatchLogsClient::new(&config.sink)?;
    info!(
        subscription = %queue.subscription_path(),
        sink = %config.sink.endpoint,
        "Relay configured"
    );

    // Shared across cycles so known destinations skip the probe
    let mut cache = SequenceTokenCache::new();

    let Some(interval) = interval else {
        run_cycle(&queue, &sink, &mut cache, &config).await?;
        return Ok(());
    };

    info!(interval = ?interval, "Running repeatedly, press Ctrl+C to stop");
    loop {
        // Unacknowledged messages are redelivered, so the next cycle retries them
        if let Err(e) = run_cycle(&queue, &sink, &mut cache, &config).await {
            error!(error = %e, "Relay cycle failed");
        }

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(cached_destinations = cache.len(), "Relay stopped");
    Ok(())
}

async fn run_cycle(
    queue: &PubSubClient,
    sink: &CloudWatchLogsClient,
    cache: &mut SequenceTokenCache,
    config: &Config,
) -> Result<(), RunError> {
    let summary = relay_once(queue, sink, cache, config).await?;
    info!(
        pulls = summary.pulls,
        acknowledged = summary.acknowledged,
        events_written = summary.events_written,
        "Relay cycle complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_interval("500ms"), Ok(Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        assert!(parse_interval("0s").unwrap_err().contains("greater than zero"));
        assert!(parse_interval("0ms").is_err());
    }
}
